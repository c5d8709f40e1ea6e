use std::collections::HashMap;

use playground::{AnswerValue, Interpreter, InterpreterFault, StepOutcome};

/// Line-per-unit stand-in for a real interpreter.
///
/// Blank lines and `#` comments are skipped. `let name = value` binds a
/// value, `answer a, b` submits values (bound names resolve first), and
/// `fail message` faults. Anything else is a plain unit.
#[derive(Debug, Default)]
pub(crate) struct ScriptedInterpreter {
    lines: Vec<(usize, String)>,
    cursor: usize,
    bindings: HashMap<String, AnswerValue>,
}

impl ScriptedInterpreter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn execute_line(&mut self, line: usize, text: &str) -> Result<StepOutcome, InterpreterFault> {
        if let Some(rest) = text.strip_prefix("let ") {
            let (name, value) = rest
                .split_once('=')
                .ok_or_else(|| InterpreterFault::at_line(line, "expected `let name = value`"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(InterpreterFault::at_line(line, "missing binding name"));
            }
            let value = self.resolve(value.trim());
            self.bindings.insert(name.to_owned(), value);
            return Ok(StepOutcome::Advanced { line });
        }

        if let Some(rest) = text.strip_prefix("answer") {
            let values = rest
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(|token| self.resolve(token))
                .collect();
            return Ok(StepOutcome::Answered { line, values });
        }

        if let Some(message) = text.strip_prefix("fail") {
            return Err(InterpreterFault::at_line(line, message.trim()));
        }

        Ok(StepOutcome::Advanced { line })
    }

    fn resolve(&self, token: &str) -> AnswerValue {
        if let Some(bound) = self.bindings.get(token) {
            return bound.clone();
        }
        parse_literal(token)
    }
}

impl Interpreter for ScriptedInterpreter {
    fn load(&mut self, code: &str) -> Result<(), InterpreterFault> {
        self.lines = code
            .lines()
            .enumerate()
            .map(|(index, text)| (index + 1, text.trim().to_owned()))
            .filter(|(_, text)| !text.is_empty() && !text.starts_with('#'))
            .collect();
        self.cursor = 0;
        self.bindings.clear();
        Ok(())
    }

    fn execute_one_unit(&mut self) -> Result<StepOutcome, InterpreterFault> {
        let Some((line, text)) = self.lines.get(self.cursor).cloned() else {
            return Ok(StepOutcome::ReachedEnd);
        };
        self.cursor += 1;
        self.execute_line(line, &text)
    }
}

fn parse_literal(token: &str) -> AnswerValue {
    match token {
        "True" | "true" => return AnswerValue::Boolean(true),
        "False" | "false" => return AnswerValue::Boolean(false),
        _ => {}
    }
    if let Ok(number) = token.parse::<f64>() {
        return AnswerValue::Number(number);
    }
    let unquoted = token
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(token);
    AnswerValue::Text(unquoted.to_owned())
}
