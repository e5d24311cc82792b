/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The Rule/Config store (§4.A) and the template expander (§4.B).

mod expand;
mod expr;
mod helpers;
mod value;

use std::{cell::RefCell, collections::HashMap, path::PathBuf, rc::Rc};

pub use expand::{expand, flatten_async, flatten_plain, TemplateError};
pub use expr::{eval as eval_expr, ParseError};
pub use value::{
    CommandError, CommandFn, ExprError, HelperFn, LocalBoxFuture, Outcome, TaskHandle, Value,
};

/// A prototypal attribute bag with a `base` chain (§4.A). Equality/hashing are not required;
/// copying is shallow (only ever done by sharing `Rc`s).
pub struct Rule {
    attrs: RefCell<HashMap<String, Value>>,
    base: Option<Rc<Rule>>,
}

impl Rule {
    fn new(base: Option<Rc<Rule>>) -> Rc<Rule> {
        Rc::new(Rule {
            attrs: RefCell::new(HashMap::new()),
            base,
        })
    }

    /// Builds the global `Config` root with built-in defaults and the helper functions available
    /// to every template (`len`, `glob`, `swap_ext`, `run_cmd`, `color`).
    pub fn root() -> Rc<Rule> {
        let rule = Rule::new(None);
        rule.set("jobs", Value::Number(1.0));
        rule.set("build_dir", Value::string("build"));
        rule.set("task_dir", Value::string("."));
        rule.set("files_out", Value::List(vec![]));
        rule.set("deps", Value::List(vec![]));
        rule.set("desc", Value::string("{files_in} -> {files_out}"));
        rule.set("force", Value::Bool(false));
        rule.set("dryrun", Value::Bool(false));
        rule.set("verbose", Value::Bool(false));
        rule.set("quiet", Value::Bool(false));
        rule.set("debug", Value::Bool(false));

        rule.set("len", Value::Helper(Rc::new(helpers::len)));
        rule.set("glob", Value::Helper(Rc::new(helpers::glob)));
        rule.set("swap_ext", Value::Helper(Rc::new(helpers::swap_ext)));
        rule.set("run_cmd", Value::Helper(Rc::new(helpers::run_cmd)));
        rule.set("color", Value::Helper(Rc::new(helpers::color)));
        rule
    }

    /// Looks up `key`, walking the `base` chain on a local miss. A terminal miss (no base has the
    /// key) returns `Value::Null`.
    pub fn get(&self, key: &str) -> Value {
        if let Some(value) = self.attrs.borrow().get(key) {
            return value.clone();
        }
        match &self.base {
            Some(base) => base.get(key),
            None => Value::Null,
        }
    }

    /// Returns `true` if `key` resolves to anything other than `Value::Null` anywhere in the
    /// chain. Distinguishes "explicitly set to null" (not supported) from "never set".
    pub fn has(&self, key: &str) -> bool {
        !matches!(self.get(key), Value::Null)
    }

    /// Sets `key` on this rule's local frame only -- never touches `base`.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.attrs.borrow_mut().insert(key.into(), value);
    }

    /// Produces a child rule whose `base` is `self`, with `overrides` applied on top.
    pub fn extend(self: &Rc<Self>, overrides: impl IntoIterator<Item = (String, Value)>) -> Rc<Rule> {
        let child = Rule::new(Some(self.clone()));
        for (key, value) in overrides {
            child.set(key, value);
        }
        child
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Value::String(s) => Some(s),
            Value::Path(p) => Some(p.display().to_string()),
            Value::Null => None,
            other => Some(other.to_plain_string()),
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Value::Bool(true))
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        match self.get(key) {
            Value::Path(p) => Some(p),
            Value::String(s) => Some(PathBuf::from(s)),
            Value::Null => None,
            other => Some(PathBuf::from(other.to_plain_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_inheritance_walk() {
        let root = Rule::root();
        root.set("build_dir", Value::string("out"));
        let child = root.extend([]);
        assert_eq!(child.get_string("build_dir").as_deref(), Some("out"));
        child.set("build_dir", Value::string("out2"));
        assert_eq!(child.get_string("build_dir").as_deref(), Some("out2"));
        // The parent is untouched: extend/set only ever mutate the local frame.
        assert_eq!(root.get_string("build_dir").as_deref(), Some("out"));
    }

    #[test]
    fn test_terminal_miss_is_null() {
        let root = Rule::root();
        assert!(matches!(root.get("no_such_key"), Value::Null));
        assert!(!root.has("no_such_key"));
    }
}
