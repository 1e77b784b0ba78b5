//! Per-category solution cache.
//!
//! Two scope maps (`project`, `global`) behind one reader-writer lock.
//! Per problem key and scope, at most `SOLUTIONS_PER_PROBLEM_COUNT_MAX`
//! solutions are kept; the oldest is evicted from the head. The most recent
//! solution for a key is always the last element of its sequence.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::constants::SOLUTIONS_PER_PROBLEM_COUNT_MAX;
use crate::solution::{resolve_conflict, ConflictResult, Solution};

/// Concurrent store of solutions for a single category.
///
/// Writes linearize under the exclusive lock; readers see either the state
/// before a write or after it, never a partial structure.
#[derive(Debug, Default)]
pub struct SolutionCache {
    scopes: RwLock<ScopeMaps>,
}

#[derive(Debug, Default)]
struct ScopeMaps {
    project: HashMap<String, Vec<Solution>>,
    global: HashMap<String, Vec<Solution>>,
}

impl SolutionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a solution under the chosen scope. Never fails.
    ///
    /// If the problem's sequence exceeds the per-key cap the oldest entry is
    /// dropped from the head.
    pub fn add_solution(&self, problem: &str, solution: Solution, is_global: bool) {
        let mut scopes = self.scopes.write().unwrap();
        let map = if is_global {
            &mut scopes.global
        } else {
            &mut scopes.project
        };

        let entries = map.entry(problem.to_string()).or_default();
        entries.push(solution);
        if entries.len() > SOLUTIONS_PER_PROBLEM_COUNT_MAX {
            entries.remove(0);
        }

        // Postcondition
        debug_assert!(
            (1..=SOLUTIONS_PER_PROBLEM_COUNT_MAX).contains(&entries.len()),
            "per-problem sequence length out of bounds: {}",
            entries.len()
        );
    }

    /// Resolve the best solution for a problem at `now_secs`, or `None` when
    /// neither scope has a usable candidate.
    #[must_use]
    pub fn find_solution(&self, problem: &str, now_secs: i64) -> Option<ConflictResult> {
        let scopes = self.scopes.read().unwrap();
        let project = scopes.project.get(problem).and_then(|list| list.last());
        let global = scopes.global.get(problem).and_then(|list| list.last());
        resolve_conflict(project, global, now_secs)
    }

    /// Every stored solution for a problem: project scope first, then
    /// global, each ordered oldest to newest.
    #[must_use]
    pub fn all_solutions(&self, problem: &str) -> Vec<Solution> {
        let scopes = self.scopes.read().unwrap();
        let mut all = Vec::new();
        if let Some(list) = scopes.project.get(problem) {
            all.extend(list.iter().cloned());
        }
        if let Some(list) = scopes.global.get(problem) {
            all.extend(list.iter().cloned());
        }
        all
    }

    /// Drop every stored solution.
    pub fn clear(&self) {
        let mut scopes = self.scopes.write().unwrap();
        scopes.project.clear();
        scopes.global.clear();
    }

    /// Number of problem keys per scope: `(project, global)`.
    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        let scopes = self.scopes.read().unwrap();
        (scopes.project.len(), scopes.global.len())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TIME_SECS_PER_DAY;
    use crate::solution::{ConflictStrategy, SolutionSource};

    const NOW_SECS: i64 = 1_700_000_000;

    fn solution(content: &str, source: SolutionSource, age_days: i64) -> Solution {
        Solution {
            content: content.to_string(),
            created_date: (NOW_SECS - age_days * TIME_SECS_PER_DAY).to_string(),
            use_count: 1,
            source,
        }
    }

    #[test]
    fn test_add_then_find() {
        let cache = SolutionCache::new();
        cache.add_solution(
            "build fails",
            solution("Run npm install", SolutionSource::Project, 0),
            false,
        );

        let result = cache.find_solution("build fails", NOW_SECS).unwrap();
        assert_eq!(result.solution.content, "Run npm install");
    }

    #[test]
    fn test_find_unknown_problem_is_none() {
        let cache = SolutionCache::new();
        assert!(cache.find_solution("never stored", NOW_SECS).is_none());
    }

    #[test]
    fn test_per_problem_cap_evicts_oldest() {
        let cache = SolutionCache::new();
        for i in 0..8 {
            cache.add_solution(
                "p",
                solution(&format!("solution {i}"), SolutionSource::Project, 0),
                false,
            );
        }

        let all = cache.all_solutions("p");
        assert_eq!(all.len(), SOLUTIONS_PER_PROBLEM_COUNT_MAX);
        // Oldest three were evicted from the head.
        assert_eq!(all[0].content, "solution 3");
        assert_eq!(all.last().unwrap().content, "solution 7");
    }

    #[test]
    fn test_most_recent_is_last_and_wins() {
        let cache = SolutionCache::new();
        cache.add_solution(
            "p",
            solution("first", SolutionSource::Project, 0),
            false,
        );
        cache.add_solution(
            "p",
            solution("second", SolutionSource::Project, 0),
            false,
        );

        let result = cache.find_solution("p", NOW_SECS).unwrap();
        assert_eq!(result.solution.content, "second");
    }

    #[test]
    fn test_scopes_are_independent_sequences() {
        let cache = SolutionCache::new();
        cache.add_solution("p", solution("local", SolutionSource::Project, 0), false);
        cache.add_solution("p", solution("shared", SolutionSource::Global, 0), true);

        let all = cache.all_solutions("p");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "local");
        assert_eq!(all[1].content, "shared");

        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_recent_project_beats_global() {
        // Scenario: project stored now, global stored moments later.
        let cache = SolutionCache::new();
        cache.add_solution(
            "auth fail: token expired",
            solution("Run npm install", SolutionSource::Project, 0),
            false,
        );
        cache.add_solution(
            "auth fail: token expired",
            Solution {
                content: "Update config".to_string(),
                created_date: (NOW_SECS + 10).to_string(),
                use_count: 1,
                source: SolutionSource::Global,
            },
            true,
        );

        let result = cache
            .find_solution("auth fail: token expired", NOW_SECS + 10)
            .unwrap();
        assert_eq!(result.strategy, ConflictStrategy::RecentProjectPriority);
        assert_eq!(result.solution.content, "Run npm install");
    }

    #[test]
    fn test_clear_empties_both_scopes() {
        let cache = SolutionCache::new();
        cache.add_solution("p", solution("a", SolutionSource::Project, 0), false);
        cache.add_solution("q", solution("b", SolutionSource::Global, 0), true);

        cache.clear();

        assert_eq!(cache.stats(), (0, 0));
        assert!(cache.find_solution("p", NOW_SECS).is_none());
        assert!(cache.all_solutions("q").is_empty());
    }

    #[test]
    fn test_concurrent_writers_respect_cap() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(SolutionCache::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    cache.add_solution(
                        "contended",
                        solution(&format!("t{t} s{i}"), SolutionSource::Project, 0),
                        false,
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let all = cache.all_solutions("contended");
        assert_eq!(all.len(), SOLUTIONS_PER_PROBLEM_COUNT_MAX);
    }
}
