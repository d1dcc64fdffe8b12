//! The standard built-in syscalls.
//!
//! These are ordinary host callbacks: each pops its declared arguments,
//! pushes exactly one result, and raises `BadArgument` (pushing `none`) on
//! a type mismatch. Hosts call [`resolve`] after building or loading a
//! program to bind every built-in the program references.

use crate::error::ThreadError;
use crate::thread::{SyscallCtx, SyscallFn};
use crate::value::ValueView;
use crate::vm::Vm;

/// Name/callback table for the standard set.
pub const BUILTINS: &[(&str, SyscallFn)] = &[
    ("abs", builtin_abs),
    ("min", builtin_min),
    ("max", builtin_max),
    ("len", builtin_len),
    ("bitand", builtin_bitand),
    ("sin", builtin_sin),
    ("cos", builtin_cos),
    ("tan", builtin_tan),
    ("sqrt", builtin_sqrt),
    ("round", builtin_round),
    ("ceil", builtin_ceil),
    ("floor", builtin_floor),
    ("chr", builtin_chr),
];

/// Bind every standard built-in the program's syscall table names.
pub fn resolve(vm: &mut Vm<'_>) {
    for (name, f) in BUILTINS {
        vm.resolve_syscall(name, *f);
    }
}

fn bad_argument(ctx: &mut SyscallCtx<'_>) {
    ctx.raise(ThreadError::BadArgument);
    ctx.push_none();
}

fn builtin_abs(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    let v = ctx.pop();
    match ctx.view(v) {
        ValueView::Int(i) => ctx.push_int(i.wrapping_abs()),
        ValueView::Float(f) => ctx.push_float(f.abs()),
        _ => bad_argument(ctx),
    }
}

fn builtin_min(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    let b = ctx.pop();
    let a = ctx.pop();
    match (ctx.view(a), ctx.view(b)) {
        (ValueView::Int(a), ValueView::Int(b)) => ctx.push_int(a.min(b)),
        (ValueView::Int(a), ValueView::Float(b)) => ctx.push_float((a as f32).min(b)),
        (ValueView::Float(a), ValueView::Int(b)) => ctx.push_float(a.min(b as f32)),
        (ValueView::Float(a), ValueView::Float(b)) => ctx.push_float(a.min(b)),
        _ => bad_argument(ctx),
    }
}

fn builtin_max(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    let b = ctx.pop();
    let a = ctx.pop();
    match (ctx.view(a), ctx.view(b)) {
        (ValueView::Int(a), ValueView::Int(b)) => ctx.push_int(a.max(b)),
        (ValueView::Int(a), ValueView::Float(b)) => ctx.push_float((a as f32).max(b)),
        (ValueView::Float(a), ValueView::Int(b)) => ctx.push_float(a.max(b as f32)),
        (ValueView::Float(a), ValueView::Float(b)) => ctx.push_float(a.max(b)),
        _ => bad_argument(ctx),
    }
}

fn builtin_len(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    let v = ctx.pop();
    match ctx.view(v) {
        ValueView::Str(s) => {
            let len = s.len() as i32;
            ctx.push_int(len)
        }
        ValueView::Array(items) => {
            let len = items.len() as i32;
            ctx.push_int(len)
        }
        _ => bad_argument(ctx),
    }
}

fn builtin_bitand(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    let b = ctx.pop();
    let a = ctx.pop();
    match (ctx.view(a), ctx.view(b)) {
        (ValueView::Int(a), ValueView::Int(b)) => ctx.push_int(a & b),
        _ => bad_argument(ctx),
    }
}

fn builtin_chr(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    let v = ctx.pop();
    match ctx.view(v) {
        ValueView::Int(i) => ctx.push_string(((i as u8) as char).to_string()),
        _ => bad_argument(ctx),
    }
}

/// One-float-in, one-float-out math built-ins share this shape.
fn unary_float(ctx: &mut SyscallCtx<'_>, f: fn(f32) -> f32) {
    let v = ctx.pop();
    match ctx.view(v) {
        ValueView::Int(i) => ctx.push_float(f(i as f32)),
        ValueView::Float(x) => ctx.push_float(f(x)),
        _ => bad_argument(ctx),
    }
}

fn builtin_sin(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    unary_float(ctx, f32::sin)
}

fn builtin_cos(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    unary_float(ctx, f32::cos)
}

fn builtin_tan(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    unary_float(ctx, f32::tan)
}

fn builtin_sqrt(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    unary_float(ctx, f32::sqrt)
}

fn builtin_round(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    unary_float(ctx, f32::round)
}

fn builtin_ceil(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    unary_float(ctx, f32::ceil)
}

fn builtin_floor(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
    unary_float(ctx, f32::floor)
}
