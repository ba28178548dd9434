//! Props combinator: `all` over the values of a mapping.

use super::{all_of, expect_list, expect_map};
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::types::Value;

fn props_of(engine: &Engine, input: Value) -> Result<Promise, Value> {
    if let Value::List(items) = input {
        return Ok(all_of(engine, items));
    }
    let entries = expect_map(input, "props")?;
    let (keys, values): (Vec<String>, Vec<Value>) = entries.into_iter().unzip();
    Ok(all_of(engine, values).then(move |_, resolved| {
        let resolved = expect_list(resolved, "props")?;
        Ok(Value::Map(keys.into_iter().zip(resolved).collect()))
    }))
}

impl Promise {
    /// Instance form of [`Engine::props`].
    #[must_use = "the aggregate promise carries the resolved mapping"]
    pub fn props(&self) -> Self {
        let engine = self.engine().clone();
        self.then(move |_, input| Ok(props_of(&engine, input)?.into()))
    }
}
