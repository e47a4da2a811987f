// Textual rendering of the program tree. The format is only meant for humans: trace-level log
// dumps between passes and assertion messages in tests. Functions are printed in id order,
// calls and global references are printed by name, and nested blocks are indented by two
// spaces per level.

use super::ir::{Expr, LoopBound, Stmt, UnOp};
use super::tree::ProgramTree;
use std::fmt::{self, Write};

impl fmt::Display for ProgramTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, global) in self.globals() {
            let export = if global.exported { "export " } else { "" };
            writeln!(f, "{export}global {}: {}[{}] = {}", global.name, global.ty, global.len, global.init)?;
        }
        for (_, function) in self.functions() {
            let export = if function.exported { "export " } else { "" };
            let params: Vec<String> =
                function.params.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
            write!(f, "{export}fn {}({})", function.name, params.join(", "))?;
            if let Some(ret) = function.ret {
                write!(f, " -> {ret}")?;
            }
            if let Some(limit) = function.recursion_limit {
                write!(f, " recursion({limit})")?;
            }
            writeln!(f, " {{")?;
            let mut out = String::new();
            self.write_block(&mut out, &function.body, 1)?;
            f.write_str(&out)?;
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

impl ProgramTree {
    /// Render a single expression with names resolved against this tree.
    pub fn render_expr(&self, expr: &Expr) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_expr(&mut out, expr);
        out
    }

    fn write_block(&self, out: &mut String, body: &[Stmt], depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        for stmt in body {
            out.push_str(&pad);
            match stmt {
                Stmt::Let { name, ty, value } => {
                    write!(out, "let {name}: {ty} = ")?;
                    self.write_expr(out, value)?;
                }
                Stmt::Assign { name, value } => {
                    write!(out, "{name} = ")?;
                    self.write_expr(out, value)?;
                }
                Stmt::SetGlobal { global, value } => {
                    write!(out, "{} = ", self.global_name(*global))?;
                    self.write_expr(out, value)?;
                }
                Stmt::Store { global, index, value } => {
                    write!(out, "{}[", self.global_name(*global))?;
                    self.write_expr(out, index)?;
                    out.push_str("] = ");
                    self.write_expr(out, value)?;
                }
                Stmt::Io { port, value } => {
                    write!(out, "io[{port}] <- ")?;
                    self.write_expr(out, value)?;
                }
                Stmt::Expr(expr) => self.write_expr(out, expr)?,
                Stmt::If { cond, then_body, else_body, then_probability } => {
                    out.push_str("if ");
                    self.write_expr(out, cond)?;
                    if let Some(p) = then_probability {
                        write!(out, " @{p}")?;
                    }
                    out.push_str(" {\n");
                    self.write_block(out, then_body, depth + 1)?;
                    if !else_body.is_empty() {
                        write!(out, "{pad}}} else {{\n")?;
                        self.write_block(out, else_body, depth + 1)?;
                    }
                    write!(out, "{pad}}}")?;
                }
                Stmt::Loop { counter, bound, condition, body } => {
                    out.push_str("loop");
                    if let Some(counter) = counter {
                        write!(out, " {counter}")?;
                    }
                    match bound {
                        LoopBound::Exact(n) => write!(out, " x{n}")?,
                        LoopBound::Declared(n) => write!(out, " max {n}")?,
                        LoopBound::Unknown => out.push_str(" unbounded"),
                    }
                    if let Some(cond) = condition {
                        out.push_str(" while ");
                        self.write_expr(out, cond)?;
                    }
                    out.push_str(" {\n");
                    self.write_block(out, body, depth + 1)?;
                    write!(out, "{pad}}}")?;
                }
                Stmt::Return(value) => {
                    out.push_str("return");
                    if let Some(value) = value {
                        out.push(' ');
                        self.write_expr(out, value)?;
                    }
                }
            }
            out.push('\n');
        }
        Ok(())
    }

    fn write_expr(&self, out: &mut String, expr: &Expr) -> fmt::Result {
        match expr {
            Expr::Lit(c) => write!(out, "{c}"),
            Expr::Local(name) => write!(out, "{name}"),
            Expr::Global(id) => write!(out, "{}", self.global_name(*id)),
            Expr::Load { global, index } => {
                write!(out, "{}[", self.global_name(*global))?;
                self.write_expr(out, index)?;
                out.push(']');
                Ok(())
            }
            Expr::Unary { op, operand, .. } => {
                out.push(match op {
                    UnOp::Neg => '-',
                    UnOp::BitNot => '~',
                    UnOp::Not => '!',
                });
                self.write_expr(out, operand)
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                out.push('(');
                self.write_expr(out, lhs)?;
                write!(out, " {} ", op.symbol())?;
                self.write_expr(out, rhs)?;
                out.push(')');
                Ok(())
            }
            Expr::Call { callee, args } => {
                match self.func(*callee) {
                    Some(f) => out.push_str(&f.name),
                    None => write!(out, "{callee}")?,
                }
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_expr(out, arg)?;
                }
                out.push(')');
                Ok(())
            }
        }
    }

    fn global_name(&self, id: super::tree::GlobalId) -> String {
        match self.global(id) {
            Some(g) => g.name.clone(),
            None => id.to_string(),
        }
    }
}
