// SPDX-License-Identifier: MIT

//! Progress through a funnel

use serde::Serialize;

/// Position of the current step in the funnel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    /// 1-based index of the current step
    pub current: usize,
    pub total: usize,
    pub percent: f64,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        Self {
            current,
            total,
            percent: calculate_percent(current, total),
        }
    }

    pub fn is_last(&self) -> bool {
        self.total > 0 && self.current >= self.total
    }
}

/// Percentage in `0..=100`; an empty funnel reports 0
pub fn calculate_percent(current: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (current as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Status of a step relative to the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Active,
    Upcoming,
}

impl StepStatus {
    pub fn of(index: usize, current_index: usize) -> Self {
        match index.cmp(&current_index) {
            std::cmp::Ordering::Less => StepStatus::Completed,
            std::cmp::Ordering::Equal => StepStatus::Active,
            std::cmp::Ordering::Greater => StepStatus::Upcoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_percent() {
        assert_eq!(calculate_percent(0, 0), 0.0);
        assert_eq!(calculate_percent(1, 4), 25.0);
        assert_eq!(calculate_percent(4, 4), 100.0);
        assert_eq!(calculate_percent(9, 4), 100.0);
    }

    #[test]
    fn test_progress_is_last() {
        assert!(Progress::new(10, 10).is_last());
        assert!(!Progress::new(3, 10).is_last());
        assert!(!Progress::new(0, 0).is_last());
    }

    #[test]
    fn test_step_status() {
        assert_eq!(StepStatus::of(0, 2), StepStatus::Completed);
        assert_eq!(StepStatus::of(2, 2), StepStatus::Active);
        assert_eq!(StepStatus::of(3, 2), StepStatus::Upcoming);
    }
}
