//! Batch plan: consecutive groups of at most `limit` jobs, in job order.

use crate::job::Job;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    groups: Vec<Vec<Job>>,
    total: usize,
}

impl BatchPlan {
    /// Splits `jobs` into groups of `limit` (at least one); the last group may be shorter.
    pub fn new(jobs: Vec<Job>, limit: usize) -> Self {
        let limit = limit.max(1);
        let total = jobs.len();
        let mut groups: Vec<Vec<Job>> = Vec::with_capacity(total.div_ceil(limit));
        for job in jobs {
            match groups.last_mut() {
                Some(group) if group.len() < limit => group.push(job),
                _ => groups.push(vec![job]),
            }
        }
        Self { groups, total }
    }

    pub fn groups(&self) -> &[Vec<Job>] {
        &self.groups
    }

    /// Total number of jobs across all groups.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn into_groups(self) -> Vec<Vec<Job>> {
        self.groups
    }
}
