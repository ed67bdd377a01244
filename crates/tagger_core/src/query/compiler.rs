//! Boolean tag expression tokenizer and postfix compiler.
//!
//! # Responsibility
//! - Detect whether an argument is a query or a bare entity name.
//! - Convert infix expressions to postfix with the shunting-yard method.
//! - Recover operand literals in source order with the same boundary rule.
//!
//! # Invariants
//! - Reserved characters are `! & | ( )`; a leading `{` opens an escape
//!   span closed by `}` in which reserved characters are literal.
//! - A space directly followed by an operator or parenthesis ends an
//!   operand; any other space belongs to it.
//! - Precedence: `!` > `&` > `|`. `&`/`|` are left-associative, `!` is a
//!   right-associative prefix.

use super::ParseError;

/// Postfix token. Operands are placeholders; see [`OperandScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixToken {
    Operand,
    Not,
    And,
    Or,
}

impl PostfixToken {
    fn from_operator(c: char) -> Option<Self> {
        match c {
            '!' => Some(Self::Not),
            '&' => Some(Self::And),
            '|' => Some(Self::Or),
            _ => None,
        }
    }

    /// Binding rank; lower binds tighter.
    fn rank(self) -> u8 {
        match self {
            Self::Not => 1,
            Self::And => 2,
            Self::Or => 3,
            Self::Operand => 0,
        }
    }

    fn is_left_assoc(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Number of stack entries consumed by this token.
    pub fn arity(self) -> usize {
        match self {
            Self::Operand => 0,
            Self::Not => 1,
            Self::And | Self::Or => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Operand => 'x',
            Self::Not => '!',
            Self::And => '&',
            Self::Or => '|',
        }
    }
}

/// Compiled query: postfix stream plus operand literals in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub postfix: Vec<PostfixToken>,
    pub operands: Vec<String>,
}

impl CompiledQuery {
    /// Renders the postfix stream, `x` standing for each operand.
    pub fn postfix_notation(&self) -> String {
        self.postfix.iter().map(|token| token.symbol()).collect()
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '!' | '&' | '|')
}

fn is_paren(c: char) -> bool {
    matches!(c, '(' | ')')
}

fn is_reserved(c: char) -> bool {
    is_operator(c) || is_paren(c)
}

/// Returns whether `text` must be evaluated as a boolean query.
pub fn is_query(text: &str) -> bool {
    let mut chars = text.chars();
    let mut escaped = text.starts_with('{');
    if escaped {
        chars.next();
    }
    for c in chars {
        if c == '}' {
            escaped = false;
        } else if !escaped && is_reserved(c) {
            return true;
        }
    }
    false
}

/// Returns the index one past the last char of the operand starting at `start`.
fn operand_end(chars: &[char], start: usize) -> usize {
    let mut index = start;
    let mut escaped = false;
    if chars.get(index) == Some(&'{') {
        escaped = true;
        index += 1;
    }
    while let Some(&c) = chars.get(index) {
        if c == '}' {
            escaped = false;
        } else if !escaped {
            let boundary_space =
                c == ' ' && chars.get(index + 1).is_some_and(|&next| is_reserved(next));
            if is_reserved(c) || boundary_space {
                break;
            }
        }
        index += 1;
    }
    index
}

/// Converts an infix expression to postfix.
///
/// Also validates operator arity so that malformed expressions such as
/// `a &` fail here instead of during evaluation.
pub fn compile_to_postfix(text: &str) -> Result<Vec<PostfixToken>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut output = Vec::with_capacity(chars.len());
    let mut stack: Vec<StackEntry> = Vec::new();

    let mut index = 0;
    while let Some(&c) = chars.get(index) {
        if c == ' ' {
            index += 1;
            continue;
        }

        if let Some(op) = PostfixToken::from_operator(c) {
            while let Some(&StackEntry::Operator(top)) = stack.last() {
                let pops = if op.is_left_assoc() {
                    op.rank() >= top.rank()
                } else {
                    op.rank() > top.rank()
                };
                if !pops {
                    break;
                }
                output.push(top);
                stack.pop();
            }
            stack.push(StackEntry::Operator(op));
            index += 1;
        } else if c == '(' {
            stack.push(StackEntry::OpenParen);
            index += 1;
        } else if c == ')' {
            loop {
                match stack.pop() {
                    Some(StackEntry::Operator(op)) => output.push(op),
                    Some(StackEntry::OpenParen) => break,
                    None => return Err(ParseError::UnbalancedClose { position: index }),
                }
            }
            index += 1;
        } else {
            output.push(PostfixToken::Operand);
            index = operand_end(&chars, index);
        }
    }

    while let Some(entry) = stack.pop() {
        match entry {
            StackEntry::Operator(op) => output.push(op),
            StackEntry::OpenParen => return Err(ParseError::UnclosedOpen),
        }
    }

    check_arity(&output)?;
    Ok(output)
}

#[derive(Debug, Clone, Copy)]
enum StackEntry {
    Operator(PostfixToken),
    OpenParen,
}

/// Simulates the evaluation stack depth of a postfix stream.
pub fn check_arity(postfix: &[PostfixToken]) -> Result<(), ParseError> {
    if postfix.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut depth = 0usize;
    for &token in postfix {
        let needed = token.arity();
        if depth < needed {
            return Err(ParseError::MissingOperand {
                operator: token.symbol(),
            });
        }
        depth = depth - needed + 1;
    }
    if depth != 1 {
        return Err(ParseError::DanglingOperands { count: depth });
    }
    Ok(())
}

/// Compiles `text` and collects its operand literals.
pub fn compile(text: &str) -> Result<CompiledQuery, ParseError> {
    let postfix = compile_to_postfix(text)?;
    let operands = OperandScanner::new(text).collect();
    Ok(CompiledQuery { postfix, operands })
}

/// Iterates operand literals of a query in left-to-right order.
///
/// Uses the same boundary rule as [`compile_to_postfix`], so the n-th
/// item matches the n-th `Operand` placeholder. Escape braces are removed.
pub struct OperandScanner {
    chars: Vec<char>,
    index: usize,
}

impl OperandScanner {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            index: 0,
        }
    }
}

impl Iterator for OperandScanner {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(&c) = self.chars.get(self.index) {
            if c == ' ' || is_reserved(c) {
                self.index += 1;
                continue;
            }

            let start = self.index;
            let end = operand_end(&self.chars, start);
            self.index = end;

            let mut literal = &self.chars[start..end];
            if let Some(rest) = literal.strip_prefix(&['{']) {
                literal = rest.strip_suffix(&['}']).unwrap_or(rest);
            }
            return Some(literal.iter().collect());
        }
        None
    }
}
