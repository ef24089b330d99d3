//! Interpreter program generation.
//!
//! The program is fed to the interpreter on stdin. It pops the secret
//! variables from its environment, evaluates the namespace bindings into a
//! fresh globals dict, loads stored snippets, then runs the caller snippet.
//! Failures are reported on stderr behind [`REPORT_MARKER`].

use std::fmt::Write as _;

use super::report::REPORT_MARKER;
use crate::namespace::{ExecutionNamespace, PyExpr, SECRET_ENV_PREFIX};

const DRIVER: &str = r#"
def _cloudops_main(bindings, modules, preloads, snippet):
    import importlib
    import json
    import os
    import traceback
    import types

    sys = _cloudops_sys
    secrets = {}
    for key in [k for k in os.environ if k.startswith(SECRET_PREFIX)]:
        secrets[key] = os.environ.pop(key)

    def _secret(name):
        return secrets[name]

    def _load(module, attr):
        loaded = importlib.import_module(module)
        return getattr(loaded, attr) if attr else loaded

    def report(stage, exc, binding=None):
        tb = exc.__traceback__
        if tb is not None and tb.tb_next is not None:
            tb = tb.tb_next
        payload = {
            "stage": stage,
            "binding": binding,
            "error_type": type(exc).__name__,
            "message": str(exc),
            "traceback": "".join(traceback.format_exception(type(exc), exc, tb)),
        }
        sys.stdout.flush()
        sys.stderr.write("\n" + REPORT_MARKER + json.dumps(payload) + "\n")
        sys.stderr.flush()

    for name, source in modules:
        module = types.ModuleType(name)
        module.__file__ = "<cloudops:%s>" % name
        try:
            exec(compile(source, module.__file__, "exec"), module.__dict__)
        except Exception as exc:
            sys.stderr.write(
                "Warning: module %s is unavailable (%s: %s)\n" % (name, type(exc).__name__, exc)
            )
            continue
        sys.modules[name] = module

    ns = {"__name__": "__main__", "__builtins__": __builtins__}
    for name, optional, build in bindings:
        try:
            ns[name] = build(ns, _load, _secret)
        except Exception as exc:
            if optional:
                sys.stderr.write(
                    "Warning: %s is unavailable (%s: %s)\n" % (name, type(exc).__name__, exc)
                )
                continue
            report("namespace", exc, name)
            return 1
    secrets.clear()

    for name, code in preloads:
        try:
            exec(compile(code, "<stored:%s>" % name, "exec"), ns)
        except Exception as exc:
            sys.stderr.write(
                "Warning: failed to load stored snippet %s (%s: %s)\n"
                % (name, type(exc).__name__, exc)
            )

    try:
        exec(compile(snippet, "<snippet>", "exec"), ns)
    except SystemExit as exc:
        if exc.code is None or exc.code == 0:
            return 0
        report("snippet", exc)
        return 1
    except BaseException as exc:
        report("snippet", exc)
        return 1
    return 0


_cloudops_status = _cloudops_main(BINDINGS, MODULES, PRELOADS, SNIPPET)
_cloudops_sys.stdout.flush()
_cloudops_sys.exit(_cloudops_status)
"#;

/// Render the complete program for one execution.
pub(crate) fn render_program(namespace: &ExecutionNamespace, snippet: &str) -> String {
    let mut out = String::with_capacity(DRIVER.len() + snippet.len() + 1024);
    out.push_str("import sys as _cloudops_sys\n\n");
    let _ = writeln!(out, "REPORT_MARKER = {}", py_str(REPORT_MARKER));
    let _ = writeln!(out, "SECRET_PREFIX = {}", py_str(SECRET_ENV_PREFIX));

    out.push_str("BINDINGS = [\n");
    for binding in namespace.bindings() {
        let _ = writeln!(
            out,
            "    ({}, {}, lambda _ns, _load, _secret: {}),",
            py_str(&binding.name),
            if binding.optional { "True" } else { "False" },
            render_expr(&binding.expr)
        );
    }
    out.push_str("]\n");

    out.push_str("MODULES = [\n");
    for (name, source) in namespace.modules() {
        let _ = writeln!(out, "    ({}, {}),", py_str(name), py_str(source));
    }
    out.push_str("]\n");

    out.push_str("PRELOADS = [\n");
    for (name, code) in namespace.preloads() {
        let _ = writeln!(out, "    ({}, {}),", py_str(name), py_str(code));
    }
    out.push_str("]\n");

    let _ = writeln!(out, "SNIPPET = {}", py_str(snippet));
    out.push_str(DRIVER);
    out
}

/// Render a binding expression.
pub(crate) fn render_expr(expr: &PyExpr) -> String {
    match expr {
        PyExpr::Import { module, attr } => format!(
            "_load({}, {})",
            py_str(module),
            attr.as_deref().map_or_else(|| "None".to_string(), py_str)
        ),
        PyExpr::Str(value) => py_str(value),
        PyExpr::Secret(var) => format!("_secret({})", py_str(var)),
        PyExpr::Binding(name) => format!("_ns[{}]", py_str(name)),
        PyExpr::None => "None".to_string(),
        PyExpr::Call {
            callee,
            args,
            kwargs,
        } => {
            let mut parts: Vec<String> = args.iter().map(render_expr).collect();
            parts.extend(
                kwargs
                    .iter()
                    .map(|(name, value)| format!("{name}={}", render_expr(value))),
            );
            format!("{}({})", render_expr(callee), parts.join(", "))
        }
    }
}

/// Double-quoted Python string literal.
pub(crate) fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
