//! The two-pass assembly driver
//!
//! Converts ACME-dialect assembly source into a 64 KiB byte image in two
//! passes. Pass 1 parses the source line by line, defines labels, expands
//! macros and loops, resolves includes and commits the size of every
//! instruction. Pass 2 walks the recorded line vector with all symbols
//! known and re-emits the final bytes. The central invariant between the
//! passes is size stability: the byte offset of every label computed in
//! pass 1 must survive pass 2, so a forward-referenced operand that turns
//! out to fit in zero page stays in its committed absolute form.
//!
//! All mutable assembly state lives in [`Assembler`]; the lexer, the
//! expression machinery and the opcode table are pure functions over it.

pub mod directives;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::expr::{EvalContext, EvalResult, Expr, eval, first_undefined};
use crate::files::{self, SourceResolver};
use crate::opcodes::{self, AddrMode, Cpu};
use crate::statement::{
    self, Assignment, Directive, Instruction, LabelKind, MacroCall, Statement, StatementBody,
};
use crate::symbols::{AnonLabels, SymbolFlags, SymbolTable, mangle_local};

pub const MAX_CONDITIONAL_DEPTH: usize = 64;
pub const MAX_LOOP_DEPTH: usize = 64;
pub const MAX_INCLUDE_DEPTH: usize = 32;
pub const MAX_MACRO_DEPTH: usize = 32;
pub const MAX_LOOP_ITERATIONS: usize = 100_000;
pub const DEFAULT_MAX_ERRORS: usize = 20;

/// How many emitted bytes each line record keeps for the listing
const LISTING_BYTES_KEPT: usize = 8;

/// Which of the two passes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    One,
    Two,
}

/// An error that can occur during assembly
#[derive(Debug, Clone, PartialEq)]
pub enum AsmError {
    // Lexical
    UnterminatedString,
    UnterminatedChar,
    UnknownEscape { escape: char },
    NumberOverflow,
    UnexpectedCharacter { character: char },
    // Syntactic
    ExpectedToken { expected: &'static str, found: String },
    ExpectedExpression { found: String },
    MissingRightHandSide { name: String },
    // Semantic
    UndefinedSymbol { name: String },
    DuplicateConstant { name: String },
    InvalidAddressingMode { mnemonic: String },
    BranchOutOfRange { target: i32, offset: i32 },
    IllegalOpcode { mnemonic: String, cpu: Cpu },
    // Directive
    BadArgumentCount { directive: String, expected: &'static str, found: usize },
    ConstantRequired { directive: String },
    ValueOutOfRange { directive: String, value: i32 },
    FileNotFound { name: String },
    ReadError { path: String },
    BadDefine { text: String },
    NestedPseudoPc,
    RealPcWithoutPseudoPc,
    ElseWithoutIf,
    EndifWithoutIf,
    DuplicateElse,
    UnterminatedConditional,
    UnterminatedMacro,
    UnterminatedLoop,
    UnmatchedBlockEnd { directive: String },
    UnknownCpu { name: String },
    UndefinedMacro { name: String },
    MacroArgumentCount { name: String, expected: usize, found: usize },
    UserError { message: String },
    // Resource
    IncludeDepthExceeded,
    MacroDepthExceeded,
    ConditionalDepthExceeded,
    LoopDepthExceeded,
    LoopIterationCap,
    TooManyErrors,
}

impl std::error::Error for AsmError {}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::UnterminatedString => write!(f, "unterminated string literal"),
            AsmError::UnterminatedChar => write!(f, "unterminated character literal"),
            AsmError::UnknownEscape { escape } => {
                write!(f, "unknown escape sequence \"\\{}\"", escape)
            }
            AsmError::NumberOverflow => write!(f, "numeric literal does not fit in 32 bits"),
            AsmError::UnexpectedCharacter { character } => {
                write!(f, "unexpected character \"{}\"", character)
            }
            AsmError::ExpectedToken { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            AsmError::ExpectedExpression { found } => {
                write!(f, "expected an expression, found {}", found)
            }
            AsmError::MissingRightHandSide { name } => {
                write!(f, "assignment to \"{}\" has no right-hand side", name)
            }
            AsmError::UndefinedSymbol { name } => write!(f, "undefined symbol \"{}\"", name),
            AsmError::DuplicateConstant { name } => {
                write!(f, "symbol \"{}\" is a constant and cannot be redefined", name)
            }
            AsmError::InvalidAddressingMode { mnemonic } => {
                write!(f, "invalid addressing mode for instruction \"{}\"", mnemonic)
            }
            AsmError::BranchOutOfRange { target, offset } => write!(
                f,
                "branch target out of range: ${:04x} is {} bytes away",
                target, offset
            ),
            AsmError::IllegalOpcode { mnemonic, cpu } => write!(
                f,
                "instruction \"{}\" is an illegal opcode and the {} rejects it",
                mnemonic, cpu
            ),
            AsmError::BadArgumentCount {
                directive,
                expected,
                found,
            } => write!(
                f,
                "directive !{} expects {}, found {} arguments",
                directive, expected, found
            ),
            AsmError::ConstantRequired { directive } => {
                write!(f, "directive !{} needs a constant value", directive)
            }
            AsmError::ValueOutOfRange { directive, value } => {
                write!(f, "directive !{} value {} is out of range", directive, value)
            }
            AsmError::FileNotFound { name } => write!(f, "file \"{}\" not found", name),
            AsmError::ReadError { path } => write!(f, "failed to read file {}", path),
            AsmError::BadDefine { text } => {
                write!(f, "malformed command-line define \"{}\"", text)
            }
            AsmError::NestedPseudoPc => write!(f, "!pseudopc sections cannot nest"),
            AsmError::RealPcWithoutPseudoPc => {
                write!(f, "!realpc without a matching !pseudopc")
            }
            AsmError::ElseWithoutIf => write!(f, "!else without !if"),
            AsmError::EndifWithoutIf => write!(f, "!endif without !if"),
            AsmError::DuplicateElse => write!(f, "duplicate !else in conditional"),
            AsmError::UnterminatedConditional => write!(f, "unterminated !if at end of input"),
            AsmError::UnterminatedMacro => write!(f, "unterminated !macro at end of input"),
            AsmError::UnterminatedLoop => write!(f, "unterminated loop at end of input"),
            AsmError::UnmatchedBlockEnd { directive } => {
                write!(f, "!{} without a matching opener", directive)
            }
            AsmError::UnknownCpu { name } => write!(f, "unknown processor \"{}\"", name),
            AsmError::UndefinedMacro { name } => write!(f, "call of undefined macro \"{}\"", name),
            AsmError::MacroArgumentCount {
                name,
                expected,
                found,
            } => write!(
                f,
                "macro \"{}\" takes {} arguments, found {}",
                name, expected, found
            ),
            AsmError::UserError { message } => write!(f, "{}", message),
            AsmError::IncludeDepthExceeded => write!(f, "include nesting too deep"),
            AsmError::MacroDepthExceeded => write!(f, "macro expansion too deep"),
            AsmError::ConditionalDepthExceeded => write!(f, "conditional nesting too deep"),
            AsmError::LoopDepthExceeded => write!(f, "loop nesting too deep"),
            AsmError::LoopIterationCap => write!(f, "loop exceeded the iteration cap"),
            AsmError::TooManyErrors => write!(f, "too many errors, giving up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

/// One reported problem, with its source location
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    pub level: Level,
    pub message: String,
}

/// One statement that survived pass 1, with everything the listing needs
#[derive(Debug, Clone, Default)]
pub struct AssembledLine {
    pub statement: Statement,
    /// Virtual PC at the start of the line
    pub pc: i32,
    /// Physical output position at the start of the line
    pub real_pc: i32,
    pub source: String,
    /// Zone in effect at this line, for local-label resolution in pass 2
    pub zone: Option<String>,
    pub file: String,
    pub line: usize,
    /// First emitted bytes, filled by pass 2
    pub bytes: Vec<u8>,
    pub byte_count: usize,
    pub cycles: u8,
    pub page_penalty: bool,
}

#[derive(Debug, Clone)]
struct MacroDef {
    params: Vec<String>,
    body: Vec<String>,
    file: String,
    line: usize,
}

#[derive(Debug, Clone, Copy)]
struct Conditional {
    parent_active: bool,
    branch_active: bool,
    else_seen: bool,
}

pub struct Assembler {
    memory: Box<[u8]>,
    written: Box<[bool]>,
    lowest: usize,
    highest: usize,
    pc: i32,
    real_pc: i32,
    in_pseudopc: bool,
    symbols: SymbolTable,
    anons: AnonLabels,
    zone: Option<String>,
    zone_counter: u32,
    macros: HashMap<String, MacroDef>,
    macro_depth: usize,
    macro_id: u32,
    include_depth: usize,
    conditionals: Vec<Conditional>,
    loop_depth: usize,
    cpu: Cpu,
    configured_cpu: Cpu,
    pass: Pass,
    errors: usize,
    warnings: usize,
    max_errors: usize,
    halted: bool,
    diagnostics: Vec<Diagnostic>,
    lines: Vec<AssembledLine>,
    resolver: SourceResolver,
    cli_defines: Vec<(String, i32)>,
    cycle_listing: bool,
    main_file: String,
    line_bytes: Vec<u8>,
    line_emit_count: usize,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler {
            memory: vec![0u8; 0x10000].into_boxed_slice(),
            written: vec![false; 0x10000].into_boxed_slice(),
            lowest: 0x10000,
            highest: 0,
            pc: 0,
            real_pc: 0,
            in_pseudopc: false,
            symbols: SymbolTable::new(),
            anons: AnonLabels::new(),
            zone: None,
            zone_counter: 0,
            macros: HashMap::new(),
            macro_depth: 0,
            macro_id: 0,
            include_depth: 0,
            conditionals: Vec::new(),
            loop_depth: 0,
            cpu: Cpu::Mos6510,
            configured_cpu: Cpu::Mos6510,
            pass: Pass::One,
            errors: 0,
            warnings: 0,
            max_errors: DEFAULT_MAX_ERRORS,
            halted: false,
            diagnostics: Vec::new(),
            lines: Vec::new(),
            resolver: SourceResolver::new(),
            cli_defines: Vec::new(),
            cycle_listing: false,
            main_file: String::new(),
            line_bytes: Vec::new(),
            line_emit_count: 0,
        }
    }

    pub fn set_cpu(&mut self, cpu: Cpu) {
        self.configured_cpu = cpu;
        self.cpu = cpu;
    }

    pub fn set_max_errors(&mut self, max_errors: usize) {
        self.max_errors = max_errors.max(1);
    }

    pub fn set_cycle_listing(&mut self, enabled: bool) {
        self.cycle_listing = enabled;
    }

    pub fn add_include_path<P: Into<std::path::PathBuf>>(&mut self, path: P) {
        self.resolver.add_path(path.into());
    }

    pub fn add_include_paths_from_env(&mut self, variable: &str, delimiter: char) {
        self.resolver.add_paths_from_env(variable, delimiter);
    }

    /// Register a `NAME[=VALUE]` define. It is applied as a constant
    /// symbol on every assembly reset.
    pub fn add_cli_define(&mut self, text: &str) -> Result<(), AsmError> {
        let (name, value) = files::parse_define(text)?;
        self.cli_defines.push((name, value));
        Ok(())
    }

    /// Assemble a file from disk. Returns `false` when any error was
    /// reported; the (possibly partial) image stays inspectable.
    pub fn assemble_file(&mut self, path: &Path) -> bool {
        let label = path.display().to_string();
        match files::read_source(path) {
            Ok(text) => self.assemble_source(&text, &label),
            Err(error) => {
                self.reset();
                self.report_error(&label, 0, error);
                false
            }
        }
    }

    /// Assemble source text. `file_label` names the source in
    /// diagnostics and include resolution.
    pub fn assemble_source(&mut self, source: &str, file_label: &str) -> bool {
        self.reset();
        self.main_file = file_label.to_string();

        log::debug!("pass 1 over {}", file_label);
        self.pass = Pass::One;
        let lines: Vec<&str> = source.lines().collect();
        self.run_lines(&lines, file_label, 1);
        if !self.conditionals.is_empty() {
            let label = self.main_file.clone();
            self.report_error(&label, lines.len(), AsmError::UnterminatedConditional);
            self.conditionals.clear();
        }

        if !self.halted {
            log::debug!("pass 2 over {} ({} lines)", file_label, self.lines.len());
            self.run_second_pass();
        }
        self.errors == 0
    }

    fn reset(&mut self) {
        self.memory.fill(0);
        self.written.fill(false);
        self.lowest = 0x10000;
        self.highest = 0;
        self.pc = 0;
        self.real_pc = 0;
        self.in_pseudopc = false;
        self.symbols = SymbolTable::new();
        self.anons.clear();
        self.zone = None;
        self.zone_counter = 0;
        self.macros.clear();
        self.macro_depth = 0;
        self.macro_id = 0;
        self.include_depth = 0;
        self.conditionals.clear();
        self.loop_depth = 0;
        self.cpu = self.configured_cpu;
        self.pass = Pass::One;
        self.errors = 0;
        self.warnings = 0;
        self.halted = false;
        self.diagnostics.clear();
        self.lines.clear();
        self.line_bytes.clear();
        self.line_emit_count = 0;
        for (name, value) in self.cli_defines.clone() {
            let mut flags = SymbolFlags::DEFINED | SymbolFlags::CONSTANT;
            if (0..=0xff).contains(&value) {
                flags |= SymbolFlags::ZEROPAGE;
            }
            self.symbols.define(&name, value, flags);
        }
    }

    // ------------------------------------------------------------------
    // Pass 1

    /// Run pass 1 over a slice of source lines. Includes, macro
    /// expansions and loop bodies re-enter here recursively with the
    /// same driver state.
    fn run_lines(&mut self, lines: &[&str], file: &str, first_line: usize) {
        let mut index = 0;
        while index < lines.len() {
            if self.halted {
                return;
            }
            let text = lines[index];
            let line_number = first_line + index;
            let statement = statement::parse_line(text);

            // Conditional directives are processed even in inactive
            // regions so nesting stays balanced.
            if let StatementBody::Directive(directive) = &statement.body {
                if matches!(
                    directive.name.as_str(),
                    "if" | "ifdef" | "ifndef" | "else" | "endif"
                ) {
                    let directive = directive.clone();
                    self.handle_conditional(&directive, file, line_number);
                    index += 1;
                    continue;
                }
            }

            if !self.cond_active() {
                index += 1;
                continue;
            }

            // Block-structured directives own their body lines and steer
            // the scan index themselves.
            if let StatementBody::Directive(directive) = &statement.body {
                match directive.name.as_str() {
                    "macro" => {
                        self.define_statement_label(&statement, file, line_number);
                        match find_block_end(lines, index, &["macro"], &["endmacro", "endm"]) {
                            Some(end) => {
                                self.register_macro(
                                    directive,
                                    &lines[index + 1..end],
                                    file,
                                    line_number,
                                );
                                index = end + 1;
                            }
                            None => {
                                self.report_error(file, line_number, AsmError::UnterminatedMacro);
                                index = lines.len();
                            }
                        }
                        continue;
                    }
                    "for" | "while" => {
                        self.define_statement_label(&statement, file, line_number);
                        match find_block_end(lines, index, &["for", "while"], &["end"]) {
                            Some(end) => {
                                let body: Vec<String> =
                                    lines[index + 1..end].iter().map(|l| l.to_string()).collect();
                                let directive = directive.clone();
                                self.run_loop(&directive, &body, file, line_number);
                                index = end + 1;
                            }
                            None => {
                                self.report_error(file, line_number, AsmError::UnterminatedLoop);
                                index = lines.len();
                            }
                        }
                        continue;
                    }
                    "source" | "src" | "include" => {
                        self.define_statement_label(&statement, file, line_number);
                        let directive = directive.clone();
                        self.process_include(&directive, file, line_number);
                        index += 1;
                        continue;
                    }
                    "endmacro" | "endm" | "end" => {
                        self.report_error(
                            file,
                            line_number,
                            AsmError::UnmatchedBlockEnd {
                                directive: directive.name.clone(),
                            },
                        );
                        index += 1;
                        continue;
                    }
                    _ => {}
                }
            }

            self.execute_statement_pass1(statement, text, file, line_number);
            index += 1;
        }
    }

    /// Define the label on the front of a statement, then execute its
    /// body and append a line record.
    fn execute_statement_pass1(
        &mut self,
        mut statement: Statement,
        text: &str,
        file: &str,
        line: usize,
    ) {
        let pc = self.pc;
        let real_pc = self.real_pc;
        self.line_bytes.clear();
        self.line_emit_count = 0;
        self.define_statement_label(&statement, file, line);

        let mut record = true;
        match &mut statement.body {
            StatementBody::Empty => {}
            StatementBody::Error(message) => {
                let message = message.clone();
                self.report_error_text(file, line, message);
            }
            StatementBody::Assignment(assignment) => {
                let assignment = assignment.clone();
                self.execute_assignment(&assignment, file, line);
            }
            StatementBody::Instruction(instruction) => {
                if let Err(error) = self.encode_instruction(instruction, file, line) {
                    self.report_error(file, line, error);
                }
            }
            StatementBody::Directive(directive) => {
                let directive = directive.clone();
                if let Err(error) = directives::execute(self, &directive, file, line) {
                    self.report_error(file, line, error);
                }
            }
            StatementBody::MacroCall(call) => {
                let call = call.clone();
                self.expand_macro(&call, file, line);
                // the expansion recorded its own lines
                record = false;
            }
        }

        if record {
            let byte_count = self.line_emit_count;
            let bytes = self.line_bytes.clone();
            self.lines.push(AssembledLine {
                statement,
                pc,
                real_pc,
                source: text.to_string(),
                zone: self.zone.clone(),
                file: file.to_string(),
                line,
                bytes,
                byte_count,
                cycles: 0,
                page_penalty: false,
            });
        }
    }

    fn define_statement_label(&mut self, statement: &Statement, file: &str, line: usize) {
        let Some(label) = &statement.label else {
            return;
        };
        if self.pass == Pass::Two {
            // labels keep their pass-1 values; only the backward
            // anonymous list is rebuilt while walking forward
            if label.kind == LabelKind::AnonBackward {
                self.anons.push_backward(self.pc, file, line);
            }
            return;
        }
        let mut flags = SymbolFlags::DEFINED;
        if (0..=0xff).contains(&self.pc) {
            flags |= SymbolFlags::ZEROPAGE;
        }
        match label.kind {
            LabelKind::Global => {
                if self.symbols.define(&label.name, self.pc, flags).is_none() {
                    self.report_error(
                        file,
                        line,
                        AsmError::DuplicateConstant {
                            name: label.name.clone(),
                        },
                    );
                }
                // a new global label opens its own zone
                self.zone = Some(label.name.clone());
            }
            LabelKind::Local => {
                let canonical = mangle_local(&label.name, self.zone.as_deref());
                if self
                    .symbols
                    .define(&canonical, self.pc, flags | SymbolFlags::LOCAL)
                    .is_none()
                {
                    self.report_error(
                        file,
                        line,
                        AsmError::DuplicateConstant {
                            name: label.name.clone(),
                        },
                    );
                }
            }
            LabelKind::AnonForward => self.anons.push_forward(self.pc, file, line),
            LabelKind::AnonBackward => self.anons.push_backward(self.pc, file, line),
        }
    }

    fn execute_assignment(&mut self, assignment: &Assignment, file: &str, line: usize) {
        let result = self.eval_expr(&assignment.expr);
        if !result.defined {
            match self.pass {
                // forward reference: pass 2 re-runs this statement
                Pass::One => return,
                Pass::Two => {
                    let name = self.undefined_name_in(&assignment.expr);
                    self.report_error(file, line, AsmError::UndefinedSymbol { name });
                    return;
                }
            }
        }
        let canonical = mangle_local(&assignment.name, self.zone.as_deref());
        let mut flags = SymbolFlags::DEFINED;
        if result.zeropage {
            flags |= SymbolFlags::ZEROPAGE;
        }
        if self.pass == Pass::One && self.loop_depth == 0 {
            flags |= SymbolFlags::CONSTANT;
        } else {
            flags |= SymbolFlags::FORCE_UPDATE;
        }
        if self.symbols.define(&canonical, result.value, flags).is_none() {
            self.report_error(
                file,
                line,
                AsmError::DuplicateConstant {
                    name: assignment.name.clone(),
                },
            );
        }
    }

    /// Select the addressing mode, look the opcode up, and emit the
    /// instruction bytes. In pass 2 an equal-size re-selection may swap
    /// the opcode; the committed size never changes.
    fn encode_instruction(
        &mut self,
        instruction: &mut Instruction,
        file: &str,
        line: usize,
    ) -> Result<(), AsmError> {
        let operand = match &instruction.operand {
            Some(expr) => Some(self.eval_expr(expr)),
            None => None,
        };
        let (value, known) = operand.map_or((0, false), |r| (r.value, r.defined));

        let mode = opcodes::select_mode(&instruction.mnemonic, instruction.shape, value, known);
        match self.pass {
            Pass::One => {
                let info = opcodes::opcode_for(&instruction.mnemonic, mode).ok_or_else(|| {
                    AsmError::InvalidAddressingMode {
                        mnemonic: instruction.mnemonic.clone(),
                    }
                })?;
                instruction.mode = mode;
                instruction.opcode = info.opcode;
                instruction.size = info.size;
                instruction.cycles = info.cycles;
                instruction.page_penalty = info.page_penalty;
            }
            Pass::Two => {
                // re-optimisation is only permitted at equal size
                if let Some(info) = opcodes::opcode_for(&instruction.mnemonic, mode) {
                    if info.size == instruction.size {
                        instruction.mode = mode;
                        instruction.opcode = info.opcode;
                        instruction.cycles = info.cycles;
                        instruction.page_penalty = info.page_penalty;
                    }
                }
            }
        }

        let committed = opcodes::opcode_for(&instruction.mnemonic, instruction.mode).ok_or_else(
            || AsmError::InvalidAddressingMode {
                mnemonic: instruction.mnemonic.clone(),
            },
        )?;
        if committed.illegal && !self.cpu.accepts_illegal() {
            return Err(AsmError::IllegalOpcode {
                mnemonic: instruction.mnemonic.clone(),
                cpu: self.cpu,
            });
        }

        if self.pass == Pass::Two && instruction.operand.is_some() && !known {
            let name = match &instruction.operand {
                Some(expr) => self.undefined_name_in(expr),
                None => String::new(),
            };
            return Err(AsmError::UndefinedSymbol { name });
        }

        let start_pc = self.pc;
        match instruction.mode {
            AddrMode::Implied | AddrMode::Accumulator => {
                self.emit_byte(instruction.opcode);
            }
            AddrMode::Relative => {
                if self.pass == Pass::Two {
                    let offset = value.wrapping_sub(start_pc + 2);
                    if !(-128..=127).contains(&offset) {
                        return Err(AsmError::BranchOutOfRange {
                            target: value,
                            offset,
                        });
                    }
                    self.emit_byte(instruction.opcode);
                    self.emit_byte(offset as u8);
                } else {
                    self.emit_byte(instruction.opcode);
                    self.emit_byte(0);
                }
            }
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndirectX
            | AddrMode::IndirectY => {
                if self.pass == Pass::Two
                    && instruction.mode == AddrMode::Immediate
                    && !(-128..=255).contains(&value)
                {
                    self.report_warning(
                        file,
                        line,
                        format!("immediate value {} truncated to one byte", value),
                    );
                }
                self.emit_byte(instruction.opcode);
                self.emit_byte((value & 0xff) as u8);
            }
            AddrMode::Absolute | AddrMode::AbsoluteX | AddrMode::AbsoluteY | AddrMode::Indirect => {
                self.emit_byte(instruction.opcode);
                self.emit_byte((value & 0xff) as u8);
                self.emit_byte(((value >> 8) & 0xff) as u8);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Conditionals

    fn cond_active(&self) -> bool {
        self.conditionals
            .last()
            .is_none_or(|conditional| conditional.parent_active && conditional.branch_active)
    }

    fn handle_conditional(&mut self, directive: &Directive, file: &str, line: usize) {
        match directive.name.as_str() {
            "if" => {
                if self.conditionals.len() >= MAX_CONDITIONAL_DEPTH {
                    self.report_error(file, line, AsmError::ConditionalDepthExceeded);
                    return;
                }
                let parent_active = self.cond_active();
                let branch_active = if parent_active {
                    match directive.args.first() {
                        Some(expr) => {
                            let expr = expr.clone();
                            let result = self.eval_expr(&expr);
                            // undefined counts as false in pass 1
                            result.defined && result.value != 0
                        }
                        None => {
                            self.report_error(
                                file,
                                line,
                                AsmError::BadArgumentCount {
                                    directive: "if".to_string(),
                                    expected: "a condition",
                                    found: 0,
                                },
                            );
                            false
                        }
                    }
                } else {
                    false
                };
                self.conditionals.push(Conditional {
                    parent_active,
                    branch_active,
                    else_seen: false,
                });
            }
            "ifdef" | "ifndef" => {
                if self.conditionals.len() >= MAX_CONDITIONAL_DEPTH {
                    self.report_error(file, line, AsmError::ConditionalDepthExceeded);
                    return;
                }
                let parent_active = self.cond_active();
                let defined = directive.idents.first().is_some_and(|name| {
                    let canonical = mangle_local(name, self.zone.as_deref());
                    self.symbols.is_defined(&canonical)
                });
                let branch_active = if directive.name == "ifdef" {
                    defined
                } else {
                    !defined
                };
                self.conditionals.push(Conditional {
                    parent_active,
                    branch_active,
                    else_seen: false,
                });
            }
            "else" => match self.conditionals.last_mut() {
                None => self.report_error(file, line, AsmError::ElseWithoutIf),
                Some(conditional) => {
                    if conditional.else_seen {
                        self.report_error(file, line, AsmError::DuplicateElse);
                    } else {
                        conditional.else_seen = true;
                        if conditional.parent_active {
                            conditional.branch_active = !conditional.branch_active;
                        }
                    }
                }
            },
            "endif" => {
                if self.conditionals.pop().is_none() {
                    self.report_error(file, line, AsmError::EndifWithoutIf);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Macros and loops

    fn register_macro(&mut self, directive: &Directive, body: &[&str], file: &str, line: usize) {
        let mut idents = directive.idents.iter();
        let Some(name) = idents.next() else {
            self.report_error(
                file,
                line,
                AsmError::BadArgumentCount {
                    directive: "macro".to_string(),
                    expected: "a macro name",
                    found: 0,
                },
            );
            return;
        };
        let def = MacroDef {
            params: idents.cloned().collect(),
            body: body.iter().map(|l| l.to_string()).collect(),
            file: file.to_string(),
            line,
        };
        log::debug!("registered macro {} ({} lines)", name, def.body.len());
        self.macros.insert(name.to_uppercase(), def);
    }

    fn expand_macro(&mut self, call: &MacroCall, file: &str, line: usize) {
        let Some(def) = self.macros.get(&call.name.to_uppercase()).cloned() else {
            self.report_error(
                file,
                line,
                AsmError::UndefinedMacro {
                    name: call.name.clone(),
                },
            );
            return;
        };
        if def.params.len() != call.args.len() {
            self.report_error(
                file,
                line,
                AsmError::MacroArgumentCount {
                    name: call.name.clone(),
                    expected: def.params.len(),
                    found: call.args.len(),
                },
            );
            return;
        }
        if self.macro_depth >= MAX_MACRO_DEPTH {
            self.report_error(file, line, AsmError::MacroDepthExceeded);
            return;
        }

        let mut body = def.body.clone();
        for (parameter, argument) in def.params.iter().zip(&call.args) {
            for body_line in &mut body {
                *body_line = substitute_word(body_line, parameter, argument);
            }
        }

        // every expansion gets a private zone so its local labels cannot
        // collide with other expansions
        let id = self.macro_id;
        self.macro_id += 1;
        let saved_zone = std::mem::replace(&mut self.zone, Some(format!("_macro_{}", id)));
        self.macro_depth += 1;
        let refs: Vec<&str> = body.iter().map(|l| l.as_str()).collect();
        self.run_lines(&refs, &def.file, def.line + 1);
        self.macro_depth -= 1;
        self.zone = saved_zone;
    }

    fn run_loop(&mut self, directive: &Directive, body: &[String], file: &str, line: usize) {
        if self.loop_depth >= MAX_LOOP_DEPTH {
            self.report_error(file, line, AsmError::LoopDepthExceeded);
            return;
        }
        let refs: Vec<&str> = body.iter().map(|l| l.as_str()).collect();
        match directive.name.as_str() {
            "for" => {
                let Some(variable) = directive.idents.first().cloned() else {
                    self.report_error(
                        file,
                        line,
                        AsmError::BadArgumentCount {
                            directive: "for".to_string(),
                            expected: "a variable and two bounds",
                            found: directive.args.len(),
                        },
                    );
                    return;
                };
                if directive.args.len() != 2 {
                    self.report_error(
                        file,
                        line,
                        AsmError::BadArgumentCount {
                            directive: "for".to_string(),
                            expected: "a variable and two bounds",
                            found: directive.args.len(),
                        },
                    );
                    return;
                }
                let start = self.eval_expr(&directive.args[0]);
                let end = self.eval_expr(&directive.args[1]);
                if !start.defined || !end.defined {
                    self.report_error(
                        file,
                        line,
                        AsmError::ConstantRequired {
                            directive: "for".to_string(),
                        },
                    );
                    return;
                }
                let step = if start.value <= end.value { 1 } else { -1 };
                self.loop_depth += 1;
                let mut value = start.value;
                loop {
                    if self.halted {
                        break;
                    }
                    self.define_loop_variable(&variable, value);
                    let substituted: Vec<String> = refs
                        .iter()
                        .map(|l| substitute_word(l, &variable, &value.to_string()))
                        .collect();
                    let substituted_refs: Vec<&str> =
                        substituted.iter().map(|l| l.as_str()).collect();
                    self.run_lines(&substituted_refs, file, line + 1);
                    if value == end.value {
                        break;
                    }
                    value += step;
                }
                self.loop_depth -= 1;
            }
            "while" => {
                if directive.args.len() != 1 {
                    self.report_error(
                        file,
                        line,
                        AsmError::BadArgumentCount {
                            directive: "while".to_string(),
                            expected: "a condition",
                            found: directive.args.len(),
                        },
                    );
                    return;
                }
                self.loop_depth += 1;
                let mut iterations = 0usize;
                loop {
                    if self.halted {
                        break;
                    }
                    let condition = self.eval_expr(&directive.args[0]);
                    if !condition.defined || condition.value == 0 {
                        break;
                    }
                    iterations += 1;
                    if iterations > MAX_LOOP_ITERATIONS {
                        self.report_error(file, line, AsmError::LoopIterationCap);
                        break;
                    }
                    self.run_lines(&refs, file, line + 1);
                }
                self.loop_depth -= 1;
            }
            _ => {}
        }
    }

    fn define_loop_variable(&mut self, name: &str, value: i32) {
        let mut flags = SymbolFlags::DEFINED | SymbolFlags::FORCE_UPDATE;
        if (0..=0xff).contains(&value) {
            flags |= SymbolFlags::ZEROPAGE;
        }
        self.symbols.define(name, value, flags);
    }

    // ------------------------------------------------------------------
    // Includes

    fn process_include(&mut self, directive: &Directive, file: &str, line: usize) {
        let Some(name_bytes) = &directive.string_arg else {
            self.report_error(
                file,
                line,
                AsmError::BadArgumentCount {
                    directive: directive.name.clone(),
                    expected: "a file name",
                    found: directive.args.len(),
                },
            );
            return;
        };
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            self.report_error(file, line, AsmError::IncludeDepthExceeded);
            return;
        }
        let Some(path) = self.resolver.resolve(&name, Path::new(file)) else {
            self.report_error(file, line, AsmError::FileNotFound { name });
            return;
        };
        match files::read_source(&path) {
            Err(error) => self.report_error(file, line, error),
            Ok(text) => {
                log::debug!("including {}", path.display());
                let label = path.display().to_string();
                self.include_depth += 1;
                let lines: Vec<&str> = text.lines().collect();
                self.run_lines(&lines, &label, 1);
                self.include_depth -= 1;
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 2

    fn run_second_pass(&mut self) {
        self.pass = Pass::Two;
        self.anons.reset_for_second_pass();
        self.macro_id = 0;
        self.zone_counter = 0;
        self.zone = None;
        self.in_pseudopc = false;

        for index in 0..self.lines.len() {
            if self.halted {
                break;
            }
            let mut record = std::mem::take(&mut self.lines[index]);
            self.pc = record.pc;
            self.real_pc = record.real_pc;
            self.zone = record.zone.clone();
            self.line_bytes.clear();
            self.line_emit_count = 0;

            self.define_statement_label(&record.statement, &record.file, record.line);
            match &mut record.statement.body {
                StatementBody::Empty => {}
                // reported in pass 1 already
                StatementBody::Error(_) => {}
                StatementBody::Assignment(assignment) => {
                    let assignment = assignment.clone();
                    let file = record.file.clone();
                    self.execute_assignment(&assignment, &file, record.line);
                }
                StatementBody::Instruction(instruction) => {
                    let file = record.file.clone();
                    if let Err(error) = self.encode_instruction(instruction, &file, record.line) {
                        self.report_error(&file, record.line, error);
                    }
                }
                StatementBody::Directive(directive) => {
                    let directive = directive.clone();
                    let file = record.file.clone();
                    if let Err(error) = directives::execute(self, &directive, &file, record.line) {
                        self.report_error(&file, record.line, error);
                    }
                }
                // macro calls expand in pass 1 and are never recorded
                StatementBody::MacroCall(_) => {}
            }

            record.bytes = self.line_bytes.clone();
            record.byte_count = self.line_emit_count;
            if let StatementBody::Instruction(instruction) = &record.statement.body {
                record.cycles = instruction.cycles;
                record.page_penalty = instruction.page_penalty;
            }
            self.lines[index] = record;
        }
    }

    // ------------------------------------------------------------------
    // Emission and shared helpers

    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> EvalResult {
        let mut ctx = EvalContext {
            symbols: &mut self.symbols,
            anons: &mut self.anons,
            pc: self.pc,
            pass: self.pass,
            zone: self.zone.as_deref(),
        };
        eval(expr, &mut ctx)
    }

    fn undefined_name_in(&mut self, expr: &Expr) -> String {
        let mut ctx = EvalContext {
            symbols: &mut self.symbols,
            anons: &mut self.anons,
            pc: self.pc,
            pass: self.pass,
            zone: self.zone.as_deref(),
        };
        first_undefined(expr, &mut ctx).unwrap_or_else(|| "?".to_string())
    }

    /// Write one byte at the physical output position and advance both
    /// program counters
    pub(crate) fn emit_byte(&mut self, byte: u8) {
        let address = (self.real_pc & 0xffff) as usize;
        self.memory[address] = byte;
        self.written[address] = true;
        if address < self.lowest {
            self.lowest = address;
        }
        if address > self.highest {
            self.highest = address;
        }
        if self.line_bytes.len() < LISTING_BYTES_KEPT {
            self.line_bytes.push(byte);
        }
        self.line_emit_count += 1;
        self.real_pc = (self.real_pc + 1) & 0xffff;
        self.pc = (self.pc + 1) & 0xffff;
    }

    /// Advance both program counters without touching memory
    pub(crate) fn skip_bytes(&mut self, count: i32) {
        self.pc = (self.pc + count) & 0xffff;
        self.real_pc = (self.real_pc + count) & 0xffff;
    }

    pub(crate) fn report_error(&mut self, file: &str, line: usize, error: AsmError) {
        self.report_error_text(file, line, error.to_string());
    }

    fn report_error_text(&mut self, file: &str, line: usize, message: String) {
        self.errors += 1;
        self.diagnostics.push(Diagnostic {
            file: file.to_string(),
            line,
            level: Level::Error,
            message,
        });
        if self.errors >= self.max_errors && !self.halted {
            self.halted = true;
            self.diagnostics.push(Diagnostic {
                file: file.to_string(),
                line,
                level: Level::Error,
                message: AsmError::TooManyErrors.to_string(),
            });
        }
    }

    pub(crate) fn report_warning(&mut self, file: &str, line: usize, message: String) {
        self.warnings += 1;
        self.diagnostics.push(Diagnostic {
            file: file.to_string(),
            line,
            level: Level::Warning,
            message,
        });
    }

    // ------------------------------------------------------------------
    // Results

    /// The assembled image as `(load address, bytes)`, or `None` when
    /// nothing was emitted
    pub fn image(&self) -> Option<(u16, &[u8])> {
        if self.lowest <= self.highest {
            Some((self.lowest as u16, &self.memory[self.lowest..=self.highest]))
        } else {
            None
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// The value of a DEFINED symbol, by any case of its name
    pub fn symbol_value(&self, name: &str) -> Option<i32> {
        self.symbols
            .lookup(name)
            .filter(|symbol| symbol.flags.contains(SymbolFlags::DEFINED))
            .map(|symbol| symbol.value)
    }

    pub fn assembled_lines(&self) -> &[AssembledLine] {
        &self.lines
    }

    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    pub fn cycle_listing_enabled(&self) -> bool {
        self.cycle_listing
    }

    pub fn cpu(&self) -> Cpu {
        self.cpu
    }

    /// PRG image: two-byte little-endian load address, then the bytes
    pub fn prg_bytes(&self) -> Option<Vec<u8>> {
        crate::output::prg_bytes(self)
    }

    /// Raw image without the load-address header
    pub fn raw_bytes(&self) -> Option<Vec<u8>> {
        crate::output::raw_bytes(self)
    }

    /// VICE-compatible symbol file content
    pub fn symbol_file(&self) -> String {
        crate::output::symbol_file(self)
    }

    /// Assembly listing content
    pub fn listing(&self) -> String {
        crate::output::listing(self)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Assembler::new()
    }
}

/// Find the line index of the matching block closer, honouring nested
/// openers. `start` is the opener's own index.
fn find_block_end(
    lines: &[&str],
    start: usize,
    openers: &[&str],
    closers: &[&str],
) -> Option<usize> {
    let mut depth = 1usize;
    let mut index = start + 1;
    while index < lines.len() {
        let statement = statement::parse_line(lines[index]);
        if statement.directive_named(openers) {
            depth += 1;
        } else if statement.directive_named(closers) {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
        }
        index += 1;
    }
    None
}

/// Replace whole-word, case-insensitive occurrences of `name` with
/// `replacement`. Words are identifier runs; anything else passes
/// through untouched.
fn substitute_word(text: &str, name: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((start, character)) = chars.next() {
        if character == '_' || character.is_ascii_alphabetic() {
            let mut end = start + character.len_utf8();
            while let Some(&(position, next)) = chars.peek() {
                if next == '_' || next.is_ascii_alphanumeric() {
                    chars.next();
                    end = position + next.len_utf8();
                } else {
                    break;
                }
            }
            let word = &text[start..end];
            if word.eq_ignore_ascii_case(name) {
                out.push_str(replacement);
            } else {
                out.push_str(word);
            }
        } else {
            out.push(character);
        }
    }
    out
}
