//! Bytecode debugging utilities

use crate::bytecode::{ArgList, CompiledProc, Instr, Receive};
use crate::ir::CaptureSource;
use std::fmt::Write;

/// Disassembly of a procedure and everything nested in it
pub fn disassemble(proc: &CompiledProc) -> String {
    let mut out = String::new();
    write_procedure(&mut out, proc, &proc.name);
    out
}

fn write_procedure(out: &mut String, proc: &CompiledProc, path: &str) {
    let _ = writeln!(out, "========== Procedure: {} ==========", path);
    let _ = writeln!(
        out,
        "Parameters: {}{}",
        proc.param_count,
        if proc.is_vararg { " + varargs" } else { "" }
    );
    let _ = writeln!(out, "Registers: {}", proc.register_count);
    let _ = writeln!(out, "Returns: {}", proc.return_type);

    if !proc.upvalues.is_empty() {
        let _ = writeln!(out, "Upvalues:");
        for (i, source) in proc.upvalues.iter().enumerate() {
            match source {
                CaptureSource::Local(r) => {
                    let _ = writeln!(out, "  [{}] parent r{}", i, r);
                }
                CaptureSource::Upvalue(u) => {
                    let _ = writeln!(out, "  [{}] parent upvalue {}", i, u);
                }
            }
        }
    }

    match &proc.resume_table {
        None => {
            let _ = writeln!(out, "Resumption: none");
        }
        Some(table) => {
            let _ = writeln!(out, "Resumption table:");
            for (point, pc) in table.targets().iter().enumerate() {
                let _ = writeln!(out, "  @{} -> {:04}", point, pc);
            }
        }
    }

    let _ = writeln!(out, "Code:");
    for (pc, instr) in proc.code.iter().enumerate() {
        let _ = writeln!(out, "{:04}  {}", pc, format_instr(instr));
    }

    for (i, nested) in proc.nested.iter().enumerate() {
        let _ = writeln!(out);
        write_procedure(out, nested, &format!("{}.<{}:{}>", path, i, nested.name));
    }
}

/// One instruction; boxed slots are shown as `[rN]`
pub fn format_instr(instr: &Instr) -> String {
    match instr {
        Instr::Move { dst, src } => format!("MOVE        {} {}", dst, src),
        Instr::GetUpvalue { dst, index } => format!("GETUPVAL    {} u{}", dst, index),
        Instr::SetUpvalue { index, src } => format!("SETUPVAL    u{} {}", index, src),
        Instr::NewTable { dst } => format!("NEWTABLE    {}", dst),
        Instr::SetIndex { table, key, value } => {
            format!("SETINDEX    {}[{}] {}", table, key, value)
        }
        Instr::Capture { reg } => format!("CAPTURE     r{}", reg),
        Instr::Uncapture { reg } => format!("UNCAPTURE   r{}", reg),
        Instr::Closure { dst, proto } => format!("CLOSURE     {} proto#{}", dst, proto),
        Instr::Arith { op, a, b, point } => {
            format!("ARITH       {} {} {} {}", a, op, b, point)
        }
        Instr::ArithRaw { op, dst, a, b } => {
            format!("ARITHRAW    {} {} {} {}", dst, a, op, b)
        }
        Instr::Not { dst, src } => format!("NOT         {} {}", dst, src),
        Instr::Len { src, point } => format!("LEN         {} {}", src, point),
        Instr::Compare { op, dst, a, b } => format!("COMPARE     {} {} {:?} {}", dst, a, op, b),
        Instr::Index { table, key, point } => format!("INDEX       {}[{}] {}", table, key, point),
        Instr::Call {
            target,
            args,
            point,
        } => format!("CALL        {}({}) {}", target, format_args_list(args), point),
        Instr::Receive(r) => format!("RECEIVE     {}", format_receive(r)),
        Instr::Vararg(r) => format!("VARARG      {}", format_receive(r)),
        Instr::Jump { target } => format!("JUMP        {:04}", target),
        Instr::JumpIfFalse { cond, target } => format!("JUMPIFNOT   {} {:04}", cond, target),
        Instr::Return { args } => format!("RETURN      {}", format_args_list(args)),
        Instr::TailCall { target, args } => {
            format!("TAILCALL    {}({})", target, format_args_list(args))
        }
    }
}

fn format_args_list(args: &ArgList) -> String {
    let mut parts: Vec<String> = args.fixed.iter().map(|o| o.to_string()).collect();
    if args.spread {
        parts.push("...".to_string());
    }
    parts.join(", ")
}

fn format_receive(receive: &Receive) -> String {
    match receive {
        Receive::Discard => "_".to_string(),
        Receive::One(slot) => slot.to_string(),
        Receive::Fixed(slots) => slots
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        Receive::Multi => "...".to_string(),
    }
}
