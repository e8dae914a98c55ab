use crate::idx::RecipeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub output: String,
    pub inputs: Vec<String>,
}

/// Server wide recipe registry, persisted inside the manager save.
/// Opaque to the persistence coordinator; this struct is its own
/// serde contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeStore {
    recipes: IndexMap<RecipeId, Recipe>,
    next_id: u64,
}
impl RecipeStore {
    pub fn add_recipe(&mut self, recipe: Recipe) -> RecipeId {
        self.next_id += 1;
        let id = RecipeId(self.next_id);
        self.recipes.insert(id, recipe);
        id
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(&id)
    }

    pub fn recipes(&self) -> impl Iterator<Item = (RecipeId, &Recipe)> {
        self.recipes.iter().map(|(id, recipe)| (*id, recipe))
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}
