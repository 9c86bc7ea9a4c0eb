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

// Collection literals and whole-collection helpers

use std::rc::Rc;

use crate::bytecode::{Native, Op};
use crate::core::{Error, Result};
use crate::ir::{expr, AssignableValue, Expr, LocalFrame};
use crate::types::{unify_all, IndexAdapter, Shape, TypeWidget};

use super::iterate::IterateBuilder;
use super::logic::guarded;
use super::scope::ScopeBuilder;

fn element_type(items: &[Expr]) -> Result<TypeWidget> {
    if items.is_empty() {
        return Ok(TypeWidget::any());
    }
    unify_all(items.iter().map(|e| e.ty()))
}

fn fill_list(ty: TypeWidget, elem: TypeWidget, items: Vec<Expr>) -> Expr {
    expr(ty, move |code| {
        code.emit(Op::CallNative(Native::NewList));
        for item in &items {
            code.emit(Op::Dup(1));
            item.generate(code)?;
            code.cast(&elem, item.ty())?;
            code.box_value(&elem)?;
            code.emit(Op::CallNative(Native::ListAdd));
        }
        Ok(())
    })
}

/// List of `items` at their unified element type
pub fn list(items: Vec<Expr>) -> Result<Expr> {
    let elem = element_type(&items)?;
    Ok(fill_list(TypeWidget::list(elem.clone()).not_nullable(), elem, items))
}

/// Array of `elem` holding `items`
pub fn array(elem: TypeWidget, items: Vec<Expr>) -> Result<Expr> {
    Ok(fill_list(TypeWidget::array(elem.clone()).not_nullable(), elem, items))
}

/// Map of `(key, value)` entries; later duplicates win
pub fn map(entries: Vec<(Expr, Expr)>) -> Result<Expr> {
    let keys: Vec<Expr> = entries.iter().map(|(k, _)| k.clone()).collect();
    let values: Vec<Expr> = entries.iter().map(|(_, v)| v.clone()).collect();
    let (key_ty, value_ty) = (element_type(&keys)?, element_type(&values)?);
    let ty = TypeWidget::map(key_ty.clone(), value_ty.clone()).not_nullable();
    Ok(expr(ty, move |code| {
        code.emit(Op::CallNative(Native::NewMap));
        for (key, value) in &entries {
            code.emit(Op::Dup(1));
            key.generate(code)?;
            code.cast(&key_ty, key.ty())?;
            code.box_value(&key_ty)?;
            value.generate(code)?;
            code.cast(&value_ty, value.ty())?;
            code.box_value(&value_ty)?;
            code.emit(Op::CallNative(Native::MapPut));
        }
        Ok(())
    }))
}

/// Number of elements, entries or characters; null when `target` is null
pub fn length(frame: &Rc<LocalFrame>, target: Expr) -> Result<Expr> {
    let sized = matches!(target.ty().shape(), Shape::String | Shape::Bytes);
    let adapter = IndexAdapter::of(target.ty());
    if adapter.is_none() && !sized {
        return Err(Error::not_indexable(target.ty().to_string()));
    }
    guarded(
        frame,
        target,
        move |value| {
            Ok(match &adapter {
                Some(adapter) => adapter.length(value),
                None => expr(TypeWidget::int32(), move |code| {
                    value.generate(code)?;
                    code.emit(Op::CallNative(Native::Length));
                    Ok(())
                }),
            })
        },
        None,
    )
}

/// First element of `iterable`, or null when it is null or empty
pub fn first(frame: &Rc<LocalFrame>, iterable: Expr) -> Result<Expr> {
    let mut scope = ScopeBuilder::new(frame);
    let mut each = IterateBuilder::new(scope.frame(), iterable)?;
    let item_ty = each.item().ty().boxed().nullable();
    let found = scope.evaluate_into(None, crate::ir::null(item_ty));
    each.exec(found.write(each.item().read()));
    each.abort(crate::ir::literal(
        crate::core::Value::Int(1),
        TypeWidget::boolean(),
    ));
    scope.exec(each.build());
    scope.complete(found.read())
}
