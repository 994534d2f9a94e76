//! IR assertions against pass snapshots.
//!
//! The [`Checker`] renders the snapshot of a method taken at a named phase
//! (for example `load_store_elimination (after)`) as one line per phi node
//! and instruction, and matches directives against those lines:
//!
//! | Directive | Meaning |
//! |-----------|---------|
//! | `CHECK: p` | `p` matches a line after the previous match |
//! | `CHECK-NOT: p` | no line between the surrounding positive matches matches `p` |
//! | `CHECK-DAG: p` | like `CHECK`, but a run of `CHECK-DAG`s may match in any order |
//! | `CHECK-COUNT-n: p` | `p` matches `n` more lines, in order |
//!
//! A pattern matches a line if each of its whitespace separated words is a
//! word of the line, in order. Rendered lines look like:
//!
//! ```text
//! v4 = Phi v2, v3
//! v5 = InstanceFieldGet field_name:TestClass.vi
//! MonitorOperation kind:enter
//! InvokeStaticOrDirect method_name:Main.helper
//! ```
//!
//! Scripts group directives under `CHECK-START: <method> <pass> (<before|after>)`
//! headers. Lines may carry a `///` or `//` comment prefix, and the method may
//! be written with a return type and parameter list; only the qualified name
//! before the parameter list is used.

use std::fmt::Write as _;

use crate::{
    analysis::{SsaFunction, SsaOp},
    compiler::CompilerContext,
    unit::CompilationUnit,
    Error, Result,
};

/// A single checker directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Match the pattern after the previous match.
    Check(String),
    /// The pattern must not match up to the next positive match.
    CheckNot(String),
    /// Match the pattern, in any order with adjacent `CheckDag`s.
    CheckDag(String),
    /// Match the pattern the given number of times, in order.
    CheckCount(usize, String),
}

/// Directives for one method at one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckBlock {
    /// Qualified method name, e.g. `Main.testVolatile`.
    pub method: String,
    /// Phase name, e.g. `load_store_elimination (after)`.
    pub phase: String,
    /// The directives, in order.
    pub directives: Vec<Directive>,
}

/// Parses a checker script into its blocks.
///
/// # Errors
///
/// Returns [`Error::Error`] for a directive outside any `CHECK-START` block,
/// a malformed header or an unknown directive.
pub fn parse_script(script: &str) -> Result<Vec<CheckBlock>> {
    let mut blocks: Vec<CheckBlock> = Vec::new();

    for (lineno, raw) in script.lines().enumerate() {
        let line = raw.trim();
        let line = line
            .strip_prefix("///")
            .or_else(|| line.strip_prefix("//"))
            .unwrap_or(line)
            .trim();
        if !line.starts_with("CHECK") {
            continue;
        }
        let Some((keyword, rest)) = line.split_once(':') else {
            return Err(Error::Error(format!(
                "line {}: missing ':' after directive",
                lineno + 1
            )));
        };
        let rest = rest.trim();

        if keyword == "CHECK-START" {
            blocks.push(parse_header(rest).ok_or_else(|| {
                Error::Error(format!("line {}: malformed CHECK-START", lineno + 1))
            })?);
            continue;
        }

        let directive = match keyword {
            "CHECK" => Directive::Check(rest.to_string()),
            "CHECK-NOT" => Directive::CheckNot(rest.to_string()),
            "CHECK-DAG" => Directive::CheckDag(rest.to_string()),
            other => {
                let count = other
                    .strip_prefix("CHECK-COUNT-")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| {
                        Error::Error(format!("line {}: unknown directive {other}", lineno + 1))
                    })?;
                Directive::CheckCount(count, rest.to_string())
            }
        };
        let Some(block) = blocks.last_mut() else {
            return Err(Error::Error(format!(
                "line {}: directive before CHECK-START",
                lineno + 1
            )));
        };
        block.directives.push(directive);
    }

    Ok(blocks)
}

/// Splits `int Main.foo(A, B) load_store_elimination (after)` into method
/// `Main.foo` and phase `load_store_elimination (after)`.
fn parse_header(header: &str) -> Option<CheckBlock> {
    let words: Vec<&str> = header.split_whitespace().collect();
    if words.len() < 3 {
        return None;
    }
    let (method_words, phase_words) = words.split_at(words.len() - 2);
    if !matches!(phase_words[1], "(before)" | "(after)") {
        return None;
    }
    let signature = method_words.join(" ");
    let name = signature.split('(').next()?.split_whitespace().last()?;

    Some(CheckBlock {
        method: name.to_string(),
        phase: phase_words.join(" "),
        directives: Vec::new(),
    })
}

/// Returns `true` if every word of `pattern` occurs in `line`, in order.
fn line_matches(line: &str, pattern: &str) -> bool {
    let mut words = line.split_whitespace();
    pattern
        .split_whitespace()
        .all(|wanted| words.any(|word| word == wanted))
}

/// Renders `ssa` as checker lines, resolving names through `unit`.
#[must_use]
pub fn render(unit: &CompilationUnit, ssa: &SsaFunction) -> Vec<String> {
    let mut lines = Vec::new();

    for block in ssa.blocks() {
        for phi in block.phi_nodes() {
            let operands: Vec<String> = phi
                .operands()
                .iter()
                .map(|o| o.value().to_string())
                .collect();
            lines.push(format!("{} = Phi {}", phi.result(), operands.join(", ")));
        }
        for instr in block.instructions() {
            let op = instr.op();
            if matches!(op, SsaOp::Nop) {
                continue;
            }
            let mut line = String::new();
            if let Some(dest) = op.dest() {
                let _ = write!(line, "{dest} = ");
            }
            let _ = write!(line, "{}", op.kind());

            if let Some(field) = op.field() {
                let name = unit
                    .field(field.token())
                    .map_or_else(|| field.to_string(), |def| def.full_name());
                let _ = write!(line, " field_name:{name}");
            }
            match op {
                SsaOp::MonitorEnter { .. } => line.push_str(" kind:enter"),
                SsaOp::MonitorExit { .. } => line.push_str(" kind:exit"),
                SsaOp::Call { method, .. } => {
                    let name = unit
                        .method(method.token())
                        .map_or_else(|| method.to_string(), |def| def.name.clone());
                    let _ = write!(line, " method_name:{name}");
                }
                _ => {}
            }
            lines.push(line);
        }
    }

    lines
}

/// Matches directives against the rendered lines, returning the first failure.
fn match_directives(lines: &[String], directives: &[Directive]) -> std::result::Result<(), String> {
    let find = |pattern: &str, from: usize, used: &[usize]| {
        (from..lines.len()).find(|i| !used.contains(i) && line_matches(&lines[*i], pattern))
    };
    let none: &[usize] = &[];
    let check_nots = |nots: &[&str], from: usize, to: usize| {
        for pattern in nots {
            if let Some(i) = (from..to).find(|i| line_matches(&lines[*i], pattern)) {
                return Err(format!("CHECK-NOT: {pattern} matched line {}: {}", i + 1, lines[i]));
            }
        }
        Ok(())
    };

    let mut pos = 0;
    let mut nots: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < directives.len() {
        match &directives[i] {
            Directive::CheckNot(pattern) => {
                nots.push(pattern);
                i += 1;
            }
            Directive::Check(pattern) => {
                let found =
                    find(pattern, pos, none).ok_or_else(|| format!("CHECK: {pattern} not found"))?;
                check_nots(&nots, pos, found)?;
                nots.clear();
                pos = found + 1;
                i += 1;
            }
            Directive::CheckCount(count, pattern) => {
                let start = pos;
                let mut first = None;
                for n in 0..*count {
                    let found = find(pattern, pos, none).ok_or_else(|| {
                        format!("CHECK-COUNT-{count}: {pattern} matched only {n} times")
                    })?;
                    first.get_or_insert(found);
                    pos = found + 1;
                }
                check_nots(&nots, start, first.unwrap_or(start))?;
                nots.clear();
                i += 1;
            }
            Directive::CheckDag(_) => {
                let mut used = Vec::new();
                while let Some(Directive::CheckDag(pattern)) = directives.get(i) {
                    let found = find(pattern, pos, &used)
                        .ok_or_else(|| format!("CHECK-DAG: {pattern} not found"))?;
                    used.push(found);
                    i += 1;
                }
                let first = used.iter().copied().min().unwrap_or(pos);
                let last = used.iter().copied().max().unwrap_or(pos);
                check_nots(&nots, pos, first)?;
                nots.clear();
                pos = last + 1;
            }
        }
    }

    check_nots(&nots, pos, lines.len())
}

/// Runs checker directives against the snapshots stored in a context.
pub struct Checker<'a> {
    ctx: &'a CompilerContext,
}

impl<'a> Checker<'a> {
    /// Creates a checker over the snapshots of `ctx`.
    #[must_use]
    pub fn new(ctx: &'a CompilerContext) -> Self {
        Self { ctx }
    }

    /// Renders the snapshot of `method` at `phase`, one line per entry.
    #[must_use]
    pub fn render(&self, method: &str, phase: &str) -> Option<Vec<String>> {
        let token = self.ctx.unit.method_by_name(method)?.token;
        self.ctx
            .with_snapshot(token, phase, |ssa| render(&self.ctx.unit, ssa))
    }

    /// Checks `directives` against the snapshot of `method` at `phase`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CheckFailed`] if the method or snapshot is missing or
    /// a directive does not hold.
    pub fn check(&self, method: &str, phase: &str, directives: &[Directive]) -> Result<()> {
        let failed = |message: String, rendered: &[String]| Error::CheckFailed {
            method: method.to_string(),
            phase: phase.to_string(),
            message,
            rendered: rendered.join("\n"),
        };

        let lines = self
            .render(method, phase)
            .ok_or_else(|| failed("no snapshot recorded".to_string(), &[]))?;
        match_directives(&lines, directives).map_err(|message| failed(message, &lines))
    }

    /// Checks one parsed block.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn check_block(&self, block: &CheckBlock) -> Result<()> {
        self.check(&block.method, &block.phase, &block.directives)
    }

    /// Parses and checks a whole script, returning the number of blocks checked.
    ///
    /// # Errors
    ///
    /// Returns the parse error or the first failing block.
    pub fn run_script(&self, script: &str) -> Result<usize> {
        let blocks = parse_script(script)?;
        for block in &blocks {
            self.check_block(block)?;
        }
        Ok(blocks.len())
    }
}
