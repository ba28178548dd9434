//! Race combinator: the first element to settle decides.
//!
//! Losers keep running; once the race is decided their observers are removed
//! from the elements still pending. Holes are
//! not contestants, so a list of holes (or an empty list) produces a promise
//! that never settles.
//!
//! # Algebraic Laws
//!
//! - Identity: `race([a]) ≃ a`
//! - Never: `race([]) ≃ never`
//! - Preference: among already-settled elements, input order decides

use super::{expect_list, Observers};
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::types::Value;

fn race_of(engine: &Engine, items: Vec<Value>) -> Promise {
    let deferred = engine.defer();
    let mut observers = Observers::default();
    for item in items.into_iter().filter(|item| !item.is_hole()) {
        let element = engine.resolve(item);
        let on_value = deferred.resolver.clone();
        let on_reason = deferred.resolver.clone();
        observers.observe(
            &element,
            move |value| on_value.resolve(value),
            move |reason| on_reason.reject(reason),
        );
    }
    observers.release_on_settle(&deferred.promise);
    deferred.promise
}

impl Promise {
    /// Instance form of [`Engine::race`].
    #[must_use = "the race promise carries the winner's outcome"]
    pub fn race(&self) -> Self {
        let engine = self.engine().clone();
        self.then(move |_, input| Ok(race_of(&engine, expect_list(input, "race")?).into()))
    }
}
