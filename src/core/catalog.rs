use std::collections::BTreeSet;

use crate::core::pagination::Pager;
use crate::domain::model::Exercise;

/// Active catalog filters. `None` selectors mean "all". Only built through
/// [`ExerciseFilter::new`], so a stored selector is never blank or "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExerciseFilter {
    search: Option<String>,
    exercise_type: Option<String>,
    difficulty: Option<String>,
    category: Option<String>,
}

fn selector(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl ExerciseFilter {
    /// Build a filter from raw UI/CLI values, treating blank and "all" as unset.
    pub fn new(
        search: Option<String>,
        exercise_type: Option<String>,
        difficulty: Option<String>,
        category: Option<String>,
    ) -> Self {
        Self {
            search: search
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
            exercise_type: selector(exercise_type),
            difficulty: selector(difficulty),
            category: selector(category),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &ExerciseFilter::default()
    }

    /// Lowercased search term.
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn exercise_type(&self) -> Option<&str> {
        self.exercise_type.as_deref()
    }

    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn matches(&self, exercise: &Exercise) -> bool {
        if let Some(term) = &self.search {
            let in_name = exercise.exercise_name.to_lowercase().contains(term.as_str());
            let in_description = exercise
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(term.as_str()));
            if !in_name && !in_description {
                return false;
            }
        }

        let field_matches = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().map_or(true, |w| w == actual)
        };

        field_matches(&self.exercise_type, &exercise.exercise_type)
            && field_matches(&self.difficulty, &exercise.difficulty_level)
            && field_matches(&self.category, &exercise.category)
    }

    /// Matching exercises in their original order.
    pub fn apply<'a>(&self, exercises: &'a [Exercise]) -> Vec<&'a Exercise> {
        exercises.iter().filter(|e| self.matches(e)).collect()
    }
}

/// Distinct selector values present in a catalog, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    pub exercise_types: Vec<String>,
    pub difficulties: Vec<String>,
    pub categories: Vec<String>,
}

impl Facets {
    pub fn from_exercises(exercises: &[Exercise]) -> Self {
        Self {
            exercise_types: distinct(exercises.iter().map(|e| e.exercise_type.as_str())),
            difficulties: distinct(exercises.iter().map(|e| e.difficulty_level.as_str())),
            categories: distinct(exercises.iter().map(|e| e.category.as_str())),
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The full catalog plus the active filter and page cursor.
#[derive(Debug, Clone)]
pub struct CatalogView {
    exercises: Vec<Exercise>,
    filter: ExerciseFilter,
    visible: Vec<usize>,
    pager: Pager,
}

impl CatalogView {
    pub fn new(exercises: Vec<Exercise>, page_size: usize) -> Self {
        let visible: Vec<usize> = (0..exercises.len()).collect();
        let pager = Pager::new(visible.len(), page_size);
        Self {
            exercises,
            filter: ExerciseFilter::default(),
            visible,
            pager,
        }
    }

    /// Replace the filter; the cursor goes back to the first page.
    pub fn set_filter(&mut self, filter: ExerciseFilter) {
        self.visible = self
            .exercises
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.matches(e))
            .map(|(i, _)| i)
            .collect();
        self.filter = filter;
        self.pager.set_total_items(self.visible.len());
    }

    pub fn filter(&self) -> &ExerciseFilter {
        &self.filter
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    pub fn total(&self) -> usize {
        self.exercises.len()
    }

    pub fn matching(&self) -> usize {
        self.visible.len()
    }

    pub fn facets(&self) -> Facets {
        Facets::from_exercises(&self.exercises)
    }

    pub fn current_page(&self) -> Vec<&Exercise> {
        self.pager
            .slice(&self.visible)
            .iter()
            .map(|&i| &self.exercises[i])
            .collect()
    }
}
