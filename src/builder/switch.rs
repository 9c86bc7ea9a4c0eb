// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Value dispatch: switch over ints or strings, and searched case chains

use rustc_hash::FxHashSet;

use crate::core::{Error, Result};
use crate::ir::{expr, Expr};
use crate::types::{unify_all, TypeWidget};

use super::logic::branch_false;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Key {
    Int(i32),
    Str(String),
}

/// `switch value { case k => result, ... else default }`
///
/// A null selector takes the default branch. String cases match without
/// regard to case.
pub struct SwitchBuilder {
    strings: bool,
    value: Expr,
    cases: Vec<(Key, Expr)>,
    seen: FxHashSet<String>,
}

impl SwitchBuilder {
    fn new(strings: bool, value: Expr) -> Self {
        Self {
            strings,
            value,
            cases: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    /// Switch over an integral value
    pub fn integer(value: Expr) -> Result<Self> {
        let integral = value
            .ty()
            .prim()
            .map(|p| p.kind().is_integer())
            .unwrap_or(false);
        if !integral && !value.ty().is_any() {
            return Err(Error::incompatible_cast("int32", value.ty()));
        }
        Ok(Self::new(false, value))
    }

    /// Case-insensitive switch over a string value
    pub fn string(value: Expr) -> Result<Self> {
        if !value.ty().is_any() && value.ty().repr() != TypeWidget::string().repr() {
            return Err(Error::incompatible_cast("string", value.ty()));
        }
        Ok(Self::new(true, value))
    }

    fn add(mut self, key: Key, seen: String, result: Expr) -> Result<Self> {
        if !self.seen.insert(seen) {
            return Err(Error::invalid_argument(format!("duplicate case {:?}", key)));
        }
        self.cases.push((key, result));
        Ok(self)
    }

    pub fn case(self, key: i32, result: Expr) -> Result<Self> {
        if self.strings {
            return Err(Error::invalid_argument("integer case on a string switch"));
        }
        self.add(Key::Int(key), key.to_string(), result)
    }

    pub fn case_str(self, key: &str, result: Expr) -> Result<Self> {
        if !self.strings {
            return Err(Error::invalid_argument("string case on an integer switch"));
        }
        self.add(Key::Str(key.to_string()), key.to_uppercase(), result)
    }

    /// Finish with the value taken when no case matches
    pub fn exit(self, default: Expr) -> Result<Expr> {
        let ty = unify_all(
            self.cases
                .iter()
                .map(|(_, e)| e)
                .chain(std::iter::once(&default))
                .map(|e| e.ty()),
        )?;
        let (value, cases, strings) = (self.value, self.cases, self.strings);
        let target = ty.clone();
        Ok(expr(ty, move |code| {
            let fallback = code.new_label();
            let done = code.new_label();
            let labels: Vec<_> = cases.iter().map(|_| code.new_label()).collect();
            value.generate(code)?;
            if strings {
                code.cast(&TypeWidget::string(), value.ty())?;
                let table: Vec<(String, _)> = cases
                    .iter()
                    .zip(&labels)
                    .filter_map(|((key, _), label)| match key {
                        Key::Str(s) => Some((s.clone(), *label)),
                        Key::Int(_) => None,
                    })
                    .collect();
                code.emit_string_switch(&table, fallback);
            } else {
                code.cast_or_null(&TypeWidget::int32(), value.ty(), fallback)?;
                let table: std::collections::BTreeMap<i32, _> = cases
                    .iter()
                    .zip(&labels)
                    .filter_map(|((key, _), label)| match key {
                        Key::Int(k) => Some((*k, *label)),
                        Key::Str(_) => None,
                    })
                    .collect();
                code.emit_integer_switch(&table, fallback);
            }
            for (label, (_, result)) in labels.iter().zip(&cases) {
                code.mark(*label);
                result.generate(code)?;
                code.cast(&target, result.ty())?;
                code.jump(done);
            }
            code.mark(fallback);
            default.generate(code)?;
            code.cast(&target, default.ty())?;
            code.mark(done);
            Ok(())
        }))
    }
}

/// Searched case: the first true `when` test selects its value
#[derive(Default)]
pub struct CaseBuilder {
    arms: Vec<(Expr, Expr)>,
}

impl CaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, test: Expr, value: Expr) -> Self {
        self.arms.push((test, value));
        self
    }

    pub fn exit(self, default: Expr) -> Result<Expr> {
        let ty = unify_all(
            self.arms
                .iter()
                .map(|(_, v)| v)
                .chain(std::iter::once(&default))
                .map(|e| e.ty()),
        )?;
        let arms = self.arms;
        let target = ty.clone();
        Ok(expr(ty, move |code| {
            let done = code.new_label();
            for (test, value) in &arms {
                let next = code.new_label();
                branch_false(code, test, next)?;
                value.generate(code)?;
                code.cast(&target, value.ty())?;
                code.jump(done);
                code.mark(next);
            }
            default.generate(code)?;
            code.cast(&target, default.ty())?;
            code.mark(done);
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::ir::{literal, null};
    use crate::testing::run_expr;

    fn int(v: i32) -> Expr {
        literal(Value::Int(v), TypeWidget::int32())
    }

    fn text(s: &str) -> Expr {
        literal(Value::string(s), TypeWidget::string().not_nullable())
    }

    fn by_int(selector: Expr) -> Value {
        run_expr(|_| {
            SwitchBuilder::integer(selector)?
                .case(7, text("seven"))?
                .case(-3, text("minus three"))?
                .case(100, text("hundred"))?
                .exit(text("other"))
        })
    }

    fn by_name(selector: Expr) -> Value {
        run_expr(|_| {
            SwitchBuilder::string(selector)?
                .case_str("Aa", int(1))?
                .case_str("BB", int(2))?
                .case_str("c#", int(3))?
                .exit(int(0))
        })
    }

    #[test]
    fn test_integer_switch() {
        assert_eq!(by_int(int(-3)).as_str(), Some("minus three"));
        assert_eq!(by_int(int(100)).as_str(), Some("hundred"));
        assert_eq!(by_int(literal(Value::Long(7), TypeWidget::int64())).as_str(), Some("seven"));
        assert_eq!(by_int(int(8)).as_str(), Some("other"));
        assert_eq!(by_int(null(TypeWidget::int32())).as_str(), Some("other"));
    }

    #[test]
    fn test_string_switch_with_colliding_hashes() {
        assert_eq!(by_name(text("aa")).as_i64(), Some(1));
        assert_eq!(by_name(text("bb")).as_i64(), Some(2));
        // "BB" and "C#" share a hash bucket
        assert_eq!(by_name(text("C#")).as_i64(), Some(3));
        assert_eq!(by_name(text("Ab")).as_i64(), Some(0));
        assert_eq!(by_name(null(TypeWidget::string())).as_i64(), Some(0));
    }

    #[test]
    fn test_duplicate_cases_are_rejected() {
        let s = SwitchBuilder::string(text("x")).unwrap().case_str("a", int(1)).unwrap();
        assert!(s.case_str("A", int(2)).is_err());
        assert!(SwitchBuilder::integer(text("x")).is_err());
    }

    #[test]
    fn test_case_chain() {
        let truth = |v: bool| literal(Value::Int(i32::from(v)), TypeWidget::boolean());
        let out = run_expr(|_| {
            CaseBuilder::new()
                .when(null(TypeWidget::boolean()), int(1))
                .when(truth(false), int(2))
                .when(truth(true), int(3))
                .exit(int(4))
        });
        assert_eq!(out.as_i64(), Some(3));
        let out = run_expr(|_| CaseBuilder::new().exit(int(4)));
        assert_eq!(out.as_i64(), Some(4));
    }
}
