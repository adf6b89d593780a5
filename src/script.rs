//! The console language.
//!
//! A deliberately closed language: the only things a script can do are the verbs
//! of [`TurtleEngine`], arithmetic, `repeat`, `animate` and parameterless
//! procedures. Scripts are parsed completely before anything runs, so a syntax
//! error never leaves a half-drawn picture.
//!
//! ```text
//! to square [ repeat 4 [ forward 50 right 90 ] ]
//! color 255 0 0 0.5
//! repeat 36 [ square right 10 ]
//! goto random(-100, 100) -20
//! write "done"
//! ```

use crate::engine::{AnimationHandle, TurtleEngine};
use crate::error::{Result, TurtleError, ensure_finite};
use crate::render::RenderAdapter;
use std::collections::HashMap;
use std::iter::Peekable;
use std::rc::Rc;
use std::str::Chars;
use std::time::Duration;
use tracing::debug;

/// Procedure calls nested deeper than this fail with [`TurtleError::RecursionLimit`].
pub const MAX_CALL_DEPTH: usize = 64;

/// Blocks and parenthesised expressions nested deeper than this are a parse error.
pub const MAX_NEST_DEPTH: usize = 128;

/// Built-in verbs, before their arguments are parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Forward,
    Right,
    Left,
    Heading,
    Goto,
    PenUp,
    PenDown,
    Width,
    Color,
    Hide,
    Show,
    Wrap,
    Redraw,
    Write,
    Font,
    Clear,
    Reset,
    Repeat,
    Animate,
    Stop,
    StopAll,
}

/// Spelling of every verb, long forms and the usual Logo abbreviations.
const VERBS: &[(&str, Verb)] = &[
    ("forward", Verb::Forward),
    ("fd", Verb::Forward),
    ("right", Verb::Right),
    ("rt", Verb::Right),
    ("left", Verb::Left),
    ("lt", Verb::Left),
    ("heading", Verb::Heading),
    ("seth", Verb::Heading),
    ("goto", Verb::Goto),
    ("penup", Verb::PenUp),
    ("pu", Verb::PenUp),
    ("pendown", Verb::PenDown),
    ("pd", Verb::PenDown),
    ("width", Verb::Width),
    ("color", Verb::Color),
    ("colour", Verb::Color),
    ("hide", Verb::Hide),
    ("ht", Verb::Hide),
    ("show", Verb::Show),
    ("st", Verb::Show),
    ("wrap", Verb::Wrap),
    ("redraw", Verb::Redraw),
    ("write", Verb::Write),
    ("font", Verb::Font),
    ("clear", Verb::Clear),
    ("reset", Verb::Reset),
    ("repeat", Verb::Repeat),
    ("animate", Verb::Animate),
    ("stop", Verb::Stop),
    ("stopall", Verb::StopAll),
];

/// Words that cannot name a procedure.
const RESERVED: &[&str] = &["to", "random", "on", "off", "true", "false"];

fn lookup_verb(word: &str) -> Option<Verb> {
    VERBS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, verb)| *verb)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Numeric expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Neg(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    /// `random(low, high)`: an integer in `[low, high]`.
    Random(Box<Expr>, Box<Expr>),
}

/// Argument of `write`.
#[derive(Clone, Debug, PartialEq)]
pub enum Text {
    Literal(String),
    Value(Expr),
}

/// A list of commands, shared between a program and any animation it starts.
pub type Block = Rc<[Command]>;

/// One parsed command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Forward(Expr),
    Right(Expr),
    Left(Expr),
    Heading(Expr),
    Goto(Expr, Expr),
    PenUp,
    PenDown,
    Width(Expr),
    Color {
        r: Expr,
        g: Expr,
        b: Expr,
        a: Option<Expr>,
    },
    Hide,
    Show,
    Wrap(bool),
    Redraw(bool),
    Write(Text),
    Font(String),
    Clear,
    Reset,
    Repeat(Expr, Block),
    /// Interval in milliseconds, then the body.
    Animate(Expr, Block),
    Stop(Expr),
    StopAll,
    Call(String),
}

/// A parsed script: procedure definitions plus top-level commands.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub procedures: Vec<(String, Block)>,
    pub commands: Block,
}

impl Default for Program {
    fn default() -> Self {
        Self {
            procedures: Vec::new(),
            commands: Rc::from(Vec::new()),
        }
    }
}

impl Program {
    pub fn parse(source: &str) -> Result<Self> {
        Parser::new(tokenize(source)?).program()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty() && self.commands.is_empty()
    }
}

// --- tokenizer ---

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Word(String),
    Str(String),
    Open,
    Close,
    LParen,
    RParen,
    Comma,
    Op(BinOp),
}

#[derive(Clone, Debug)]
struct Spanned {
    token: Token,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    /// Last character consumed, for telling `10 -5` from `10 - 5`.
    prev: Option<char>,
}

impl Lexer<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.prev = Some(c);
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> TurtleError {
        TurtleError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    fn number(&mut self, first: char, line: usize, column: usize) -> Result<Token> {
        let mut text = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text.parse()
            .map(Token::Number)
            .map_err(|_| self.error(line, column, format!("invalid number '{}'", text)))
    }

    fn string(&mut self, line: usize, column: usize) -> Result<Token> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::Str(text)),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some(c) => text.push(c),
                    None => break,
                },
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(self.error(line, column, "unterminated string"))
    }
}

fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
        prev: None,
    };
    let mut tokens = Vec::new();

    loop {
        let (line, column) = (lexer.line, lexer.column);
        let after_gap = lexer
            .prev
            .is_none_or(|p| p.is_whitespace() || matches!(p, '[' | '(' | ','));
        let Some(c) = lexer.bump() else {
            break;
        };

        let token = match c {
            c if c.is_whitespace() => continue,
            '#' => {
                while lexer.chars.peek().is_some_and(|&c| c != '\n') {
                    lexer.bump();
                }
                continue;
            }
            '[' => Token::Open,
            ']' => Token::Close,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '+' => Token::Op(BinOp::Add),
            '*' => Token::Op(BinOp::Mul),
            '/' => Token::Op(BinOp::Div),
            // `goto 10 -5` has two arguments; `goto 10 - 5` has one.
            '-' if after_gap
                && lexer
                    .chars
                    .peek()
                    .is_some_and(|&n| n.is_ascii_digit() || n == '.') =>
            {
                lexer.number('-', line, column)?
            }
            '-' => Token::Op(BinOp::Sub),
            '"' => lexer.string(line, column)?,
            c if c.is_ascii_digit() || c == '.' => lexer.number(c, line, column)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&n) = lexer.chars.peek() {
                    if n.is_alphanumeric() || n == '_' {
                        word.push(n);
                        lexer.bump();
                    } else {
                        break;
                    }
                }
                Token::Word(word.to_lowercase())
            }
            other => {
                return Err(lexer.error(line, column, format!("unexpected character '{}'", other)));
            }
        };
        tokens.push(Spanned {
            token,
            line,
            column,
        });
    }

    Ok(tokens)
}

// --- parser ---

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_NEST_DEPTH`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NEST_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Error located at the current token, or just past the last one.
    fn error(&self, message: impl Into<String>) -> TurtleError {
        let (line, column) = match self.tokens.get(self.pos).or(self.tokens.last()) {
            Some(s) => (s.line, s.column),
            None => (1, 1),
        };
        TurtleError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn program(&mut self) -> Result<Program> {
        let mut procedures = Vec::new();
        let mut commands = Vec::new();

        while let Some(token) = self.peek() {
            if *token == Token::Word("to".into()) {
                self.pos += 1;
                let name = match self.next() {
                    Some(Token::Word(name))
                        if lookup_verb(&name).is_none() && !RESERVED.contains(&name.as_str()) =>
                    {
                        name
                    }
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        return Err(self.error("expected a procedure name after 'to'"));
                    }
                };
                let body = self.block()?;
                procedures.push((name, body));
            } else {
                commands.push(self.command()?);
            }
        }

        Ok(Program {
            procedures,
            commands: commands.into(),
        })
    }

    fn block(&mut self) -> Result<Block> {
        self.expect(Token::Open, "'['")?;
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> Result<Block> {
        let mut commands = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Close) => {
                    self.pos += 1;
                    return Ok(commands.into());
                }
                Some(Token::Word(w)) if w == "to" => {
                    return Err(self.error("procedures can only be defined at the top level"));
                }
                Some(_) => commands.push(self.command()?),
                None => return Err(self.error("expected ']'")),
            }
        }
    }

    fn command(&mut self) -> Result<Command> {
        let word = match self.peek() {
            Some(Token::Word(w)) => w.clone(),
            _ => return Err(self.error("expected a command")),
        };
        self.pos += 1;

        let Some(verb) = lookup_verb(&word) else {
            if RESERVED.contains(&word.as_str()) {
                self.pos -= 1;
                return Err(self.error(format!("'{}' is not a command", word)));
            }
            return Ok(Command::Call(word));
        };

        Ok(match verb {
            Verb::Forward => Command::Forward(self.expr()?),
            Verb::Right => Command::Right(self.expr()?),
            Verb::Left => Command::Left(self.expr()?),
            Verb::Heading => Command::Heading(self.expr()?),
            Verb::Goto => Command::Goto(self.expr()?, self.expr()?),
            Verb::PenUp => Command::PenUp,
            Verb::PenDown => Command::PenDown,
            Verb::Width => Command::Width(self.expr()?),
            Verb::Color => {
                let (r, g, b) = (self.expr()?, self.expr()?, self.expr()?);
                let a = if self.starts_expr() {
                    Some(self.expr()?)
                } else {
                    None
                };
                Command::Color { r, g, b, a }
            }
            Verb::Hide => Command::Hide,
            Verb::Show => Command::Show,
            Verb::Wrap => Command::Wrap(self.switch()?),
            Verb::Redraw => Command::Redraw(self.switch()?),
            Verb::Write => match self.peek() {
                Some(Token::Str(s)) => {
                    let s = s.clone();
                    self.pos += 1;
                    Command::Write(Text::Literal(s))
                }
                _ => Command::Write(Text::Value(self.expr()?)),
            },
            Verb::Font => match self.next() {
                Some(Token::Str(s)) => Command::Font(s),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected a quoted font such as \"12px serif\""));
                }
            },
            Verb::Clear => Command::Clear,
            Verb::Reset => Command::Reset,
            Verb::Repeat => Command::Repeat(self.expr()?, self.block()?),
            Verb::Animate => Command::Animate(self.expr()?, self.block()?),
            Verb::Stop => Command::Stop(self.expr()?),
            Verb::StopAll => Command::StopAll,
        })
    }

    fn switch(&mut self) -> Result<bool> {
        match self.next() {
            Some(Token::Word(w)) if w == "on" || w == "true" => Ok(true),
            Some(Token::Word(w)) if w == "off" || w == "false" => Ok(false),
            Some(Token::Number(n)) => Ok(n != 0.0),
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected 'on' or 'off'"))
            }
            None => Err(self.error("expected 'on' or 'off'")),
        }
    }

    fn starts_expr(&self) -> bool {
        match self.peek() {
            Some(Token::Number(_) | Token::LParen | Token::Op(BinOp::Sub)) => true,
            Some(Token::Word(w)) => w == "random",
            _ => false,
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ (BinOp::Add | BinOp::Sub))) = self.peek() {
            let op = *op;
            self.pos += 1;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(self.term()?));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ (BinOp::Mul | BinOp::Div))) = self.peek() {
            let op = *op;
            self.pos += 1;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Op(BinOp::Sub)) {
            self.pos += 1;
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.nested(Self::expr)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Word(w)) if w == "random" => {
                self.pos += 1;
                self.expect(Token::LParen, "'(' after random")?;
                let low = self.nested(Self::expr)?;
                self.expect(Token::Comma, "','")?;
                let high = self.nested(Self::expr)?;
                self.expect(Token::RParen, "')'")?;
                Ok(Expr::Random(Box::new(low), Box::new(high)))
            }
            _ => Err(self.error("expected a number")),
        }
    }
}

// --- interpreter ---

/// Runs parsed programs against a [`TurtleEngine`].
///
/// Procedures accumulate across [`define`](Self::define) calls; a later definition
/// replaces an earlier one with the same name. Cloning is cheap, which lets an
/// animation keep the procedures that existed when it started.
#[derive(Clone, Debug, Default)]
pub struct ScriptInterpreter {
    procedures: Rc<HashMap<String, Block>>,
}

impl ScriptInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every procedure in `program`.
    pub fn define(&mut self, program: &Program) {
        if program.procedures.is_empty() {
            return;
        }
        let procedures = Rc::make_mut(&mut self.procedures);
        for (name, body) in &program.procedures {
            procedures.insert(name.clone(), body.clone());
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Defines the program's procedures, then runs its commands.
    ///
    /// Returns the handles of animations started along the way. On error the
    /// engine keeps whatever the commands before the failure did; callers wanting
    /// all-or-nothing wrap this in a checkpoint.
    pub fn run<R>(
        &mut self,
        engine: &mut TurtleEngine<R>,
        program: &Program,
    ) -> Result<Vec<AnimationHandle>>
    where
        R: RenderAdapter + 'static,
    {
        self.define(program);
        let mut started = Vec::new();
        self.exec_block(engine, &program.commands, 0, &mut started)?;
        Ok(started)
    }

    fn exec_block<R>(
        &self,
        engine: &mut TurtleEngine<R>,
        block: &[Command],
        depth: usize,
        started: &mut Vec<AnimationHandle>,
    ) -> Result<()>
    where
        R: RenderAdapter + 'static,
    {
        for command in block {
            self.exec(engine, command, depth, started)?;
        }
        Ok(())
    }

    fn exec<R>(
        &self,
        engine: &mut TurtleEngine<R>,
        command: &Command,
        depth: usize,
        started: &mut Vec<AnimationHandle>,
    ) -> Result<()>
    where
        R: RenderAdapter + 'static,
    {
        match command {
            Command::Forward(d) => {
                let d = self.eval(engine, d)?;
                engine.forward(d)?;
            }
            Command::Right(a) => {
                let a = self.eval(engine, a)?;
                engine.turn_right(a)?;
            }
            Command::Left(a) => {
                let a = self.eval(engine, a)?;
                engine.turn_left(a)?;
            }
            Command::Heading(a) => {
                let a = self.eval(engine, a)?;
                engine.set_heading(a)?;
            }
            Command::Goto(x, y) => {
                let x = self.eval(engine, x)?;
                let y = self.eval(engine, y)?;
                engine.goto(x, y)?;
            }
            Command::PenUp => engine.pen_up(),
            Command::PenDown => engine.pen_down(),
            Command::Width(w) => {
                let w = self.eval(engine, w)?;
                engine.set_width(w)?;
            }
            Command::Color { r, g, b, a } => {
                let r = self.eval(engine, r)?;
                let g = self.eval(engine, g)?;
                let b = self.eval(engine, b)?;
                let a = match a {
                    Some(a) => self.eval(engine, a)?,
                    None => 1.0,
                };
                engine.set_color(r, g, b, a)?;
            }
            Command::Hide => engine.hide(),
            Command::Show => engine.show(),
            Command::Wrap(on) => engine.set_wrap(*on),
            Command::Redraw(on) => engine.set_redraw_on_move(*on),
            Command::Write(Text::Literal(s)) => engine.write(s),
            Command::Write(Text::Value(e)) => {
                let v = self.eval(engine, e)?;
                engine.write(&v.to_string());
            }
            Command::Font(spec) => engine.set_font(spec)?,
            Command::Clear => engine.clear_drawing(),
            Command::Reset => engine.reset(),
            Command::Repeat(times, body) => {
                let times = ensure_finite("repeat count", self.eval(engine, times)?)?;
                let times = times.max(0.0).floor() as usize;
                engine.repeat(times, |engine| {
                    self.exec_block(engine, body, depth, started)
                })?;
            }
            Command::Animate(interval, body) => {
                let ms = ensure_finite("interval", self.eval(engine, interval)?)?;
                let interval = Duration::from_secs_f64(ms.clamp(0.0, 1e12) / 1000.0);
                let interpreter = self.clone();
                let body = body.clone();
                let handle = engine.animate(
                    interval,
                    Box::new(move |engine: &mut TurtleEngine<R>| {
                        interpreter.exec_block(engine, &body, 0, &mut Vec::new())
                    }),
                );
                started.push(handle);
            }
            Command::Stop(handle) => {
                let id = ensure_finite("animation handle", self.eval(engine, handle)?)?;
                let handle = AnimationHandle(id.max(0.0) as u64);
                if !engine.cancel_animation(handle) {
                    debug!(handle = handle.0, "stop: no such animation");
                }
            }
            Command::StopAll => engine.cancel_all_animations(),
            Command::Call(name) => {
                if depth >= MAX_CALL_DEPTH {
                    return Err(TurtleError::RecursionLimit(MAX_CALL_DEPTH));
                }
                let body = self
                    .procedures
                    .get(name)
                    .ok_or_else(|| TurtleError::UnknownProcedure(name.clone()))?;
                self.exec_block(engine, body, depth + 1, started)?;
            }
        }
        Ok(())
    }

    fn eval<R: RenderAdapter>(&self, engine: &mut TurtleEngine<R>, expr: &Expr) -> Result<f64> {
        Ok(match expr {
            Expr::Number(n) => *n,
            Expr::Neg(e) => -self.eval(engine, e)?,
            Expr::Binary(lhs, op, rhs) => {
                let (a, b) = (self.eval(engine, lhs)?, self.eval(engine, rhs)?);
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                }
            }
            Expr::Random(low, high) => {
                let low = ensure_finite("random bound", self.eval(engine, low)?)?;
                let high = ensure_finite("random bound", self.eval(engine, high)?)?;
                engine.random_int(low.round() as i64, high.round() as i64) as f64
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfig;
    use crate::render::RecordingSurface;
    use glam::DVec2;

    fn engine() -> TurtleEngine<RecordingSurface> {
        let config = CanvasConfig {
            seed: Some(9),
            ..Default::default()
        };
        TurtleEngine::new(RecordingSurface::new(300, 300), &config).unwrap()
    }

    fn run(engine: &mut TurtleEngine<RecordingSurface>, src: &str) -> Result<Vec<AnimationHandle>> {
        ScriptInterpreter::new().run(engine, &Program::parse(src)?)
    }

    #[test]
    fn parses_verbs_and_abbreviations() {
        let p = Program::parse("fd 10 rt 90 pu\npd LT 45").unwrap();
        assert_eq!(
            &*p.commands,
            &[
                Command::Forward(Expr::Number(10.0)),
                Command::Right(Expr::Number(90.0)),
                Command::PenUp,
                Command::PenDown,
                Command::Left(Expr::Number(45.0)),
            ]
        );
    }

    #[test]
    fn minus_after_a_gap_is_a_negative_literal() {
        let p = Program::parse("goto 10 -5").unwrap();
        assert_eq!(
            &*p.commands,
            &[Command::Goto(Expr::Number(10.0), Expr::Number(-5.0))]
        );

        let p = Program::parse("forward 10 - 5").unwrap();
        assert_eq!(p.commands.len(), 1);
        let p = Program::parse("forward 10-5").unwrap();
        assert_eq!(p.commands.len(), 1);
    }

    #[test]
    fn precedence_and_parentheses() {
        let mut t = engine();
        run(&mut t, "forward 2 + 3 * 4 right 90 forward (2 + 3) * 4").unwrap();
        assert!((t.position() - DVec2::new(20.0, 14.0)).length() < 1e-9);
    }

    #[test]
    fn color_alpha_is_optional() {
        let p = Program::parse("color 255 0 0 forward 1 color 0 0 255 0.5").unwrap();
        assert!(matches!(&p.commands[0], Command::Color { a: None, .. }));
        assert!(matches!(&p.commands[2], Command::Color { a: Some(_), .. }));
    }

    #[test]
    fn procedures_and_repeat() {
        let mut t = engine();
        run(
            &mut t,
            "# a square\nto square [ repeat 4 [ forward 20 right 90 ] ]\nsquare right 90 square",
        )
        .unwrap();
        assert_eq!(t.surface().strokes().len(), 8);
        assert!(t.position().length() < 1e-9);
    }

    #[test]
    fn procedures_persist_across_runs() {
        let mut t = engine();
        let mut interp = ScriptInterpreter::new();
        interp
            .run(&mut t, &Program::parse("to step [ forward 5 ]").unwrap())
            .unwrap();
        assert!(interp.is_defined("step"));
        interp
            .run(&mut t, &Program::parse("step step").unwrap())
            .unwrap();
        assert_eq!(t.position(), DVec2::new(0.0, 10.0));
    }

    #[test]
    fn parse_errors_carry_position() {
        let err = Program::parse("forward 10\nrepeat 3 [ right 5").unwrap_err();
        assert!(matches!(err, TurtleError::Parse { line: 2, .. }), "{err}");

        let err = Program::parse("forward @").unwrap_err();
        assert_eq!(
            err,
            TurtleError::Parse {
                line: 1,
                column: 9,
                message: "unexpected character '@'".into()
            }
        );

        assert!(Program::parse("repeat 2 [ to inner [ fd 1 ] ]").is_err());
        assert!(Program::parse("to forward [ fd 1 ]").is_err());
        assert!(Program::parse("write \"open").is_err());
        assert!(Program::parse("wrap maybe").is_err());
        assert!(Program::parse("font serif").is_err());
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("forward {}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(Program::parse(&parens), Err(TurtleError::Parse { .. })));

        let blocks = format!("{}{}", "repeat 1 [ ".repeat(100_000), "]".repeat(100_000));
        assert!(matches!(Program::parse(&blocks), Err(TurtleError::Parse { .. })));

        let negs = format!("forward {}1", "- ".repeat(100_000));
        assert!(matches!(Program::parse(&negs), Err(TurtleError::Parse { .. })));

        let ok = format!("forward {}1{}", "(".repeat(50), ")".repeat(50));
        assert!(Program::parse(&ok).is_ok());
    }

    #[test]
    fn runtime_errors() {
        let mut t = engine();
        assert_eq!(
            run(&mut t, "nothing_here"),
            Err(TurtleError::UnknownProcedure("nothing_here".into()))
        );
        assert_eq!(
            run(&mut t, "to loop [ forward 1 loop ] loop"),
            Err(TurtleError::RecursionLimit(MAX_CALL_DEPTH))
        );
        assert!(matches!(
            run(&mut t, "forward 1 / 0"),
            Err(TurtleError::NonFinite { .. })
        ));
    }

    #[test]
    fn switches_and_text() {
        let mut t = engine();
        run(&mut t, "wrap off redraw false font \"bold 20px serif\" write \"hi\" write 6 * 7").unwrap();
        assert!(!t.state().wrap);
        assert!(!t.state().redraw_on_move);
        assert!(t.state().font.bold);
        let texts: Vec<_> = t
            .surface()
            .drawing_ops()
            .iter()
            .filter_map(|op| match op {
                crate::render::SurfaceOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["hi".to_string(), "42".to_string()]);
    }

    #[test]
    fn random_is_seeded_and_bounded() {
        let mut a = engine();
        let mut b = engine();
        run(&mut a, "repeat 10 [ forward random(1, 20) right random(0, 359) ]").unwrap();
        run(&mut b, "repeat 10 [ forward random(1, 20) right random(0, 359) ]").unwrap();
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn animate_returns_handles_and_stop_cancels() {
        let mut t = engine();
        let handles = run(&mut t, "animate 10 [ forward 1 ] animate 20 [ right 1 ]").unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(t.animations(), handles);

        run(&mut t, &format!("stop {}", handles[0].0)).unwrap();
        assert_eq!(t.animations(), vec![handles[1]]);
        run(&mut t, "stop 999 stopall").unwrap();
        assert!(t.animations().is_empty());
    }
}
