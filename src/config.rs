use chrono::Datelike;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DashboardError;
use crate::source::DataSource;
use crate::types::Category;

pub const DEFAULT_RENTAL_GOAL: f64 = 2700.0;
pub const DEFAULT_OWNER_GOAL: f64 = 220.0;
pub const DEFAULT_TARGET_YEAR: i32 = 2030;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_SOURCE: &str = "data/housing_data.csv";

/// Policy goals the dashboard measures progress against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goals {
    pub rental: f64,
    pub owner: f64,
}

impl Goals {
    pub fn total(&self) -> f64 {
        self.rental + self.owner
    }

    pub fn for_category(&self, category: Category) -> Option<f64> {
        match category {
            Category::Rental => Some(self.rental),
            Category::Owner => Some(self.owner),
            Category::Total => Some(self.total()),
            Category::Affordable | Category::MarketRate => None,
        }
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        for category in Category::GOAL_TRACKED {
            let goal = self.for_category(category).unwrap_or(0.0);
            if goal.is_nan() || goal <= 0.0 {
                return Err(DashboardError::InvalidGoal { category, goal });
            }
        }
        Ok(())
    }
}

impl Default for Goals {
    fn default() -> Self {
        Goals {
            rental: DEFAULT_RENTAL_GOAL,
            owner: DEFAULT_OWNER_GOAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub source: DataSource,
    pub goals: Goals,
    pub target_year: i32,
    pub current_year: i32,
    pub cache_ttl: Duration,
    pub out_dir: PathBuf,
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<(), DashboardError> {
        self.goals.validate()
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            source: DataSource::parse(DEFAULT_SOURCE),
            goals: Goals::default(),
            target_year: DEFAULT_TARGET_YEAR,
            current_year: current_calendar_year(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            out_dir: PathBuf::from("."),
        }
    }
}

pub fn current_calendar_year() -> i32 {
    chrono::Local::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_goals_are_valid() {
        let goals = Goals::default();
        assert!(goals.validate().is_ok());
        assert_eq!(goals.total(), 2920.0);
    }

    #[test]
    fn non_positive_goal_is_a_config_error() {
        let goals = Goals {
            rental: 2700.0,
            owner: 0.0,
        };
        match goals.validate() {
            Err(DashboardError::InvalidGoal { category, .. }) => {
                assert_eq!(category, Category::Owner)
            }
            other => panic!("expected InvalidGoal, got {:?}", other),
        }
        let nan = Goals {
            rental: f64::NAN,
            owner: 10.0,
        };
        assert!(nan.validate().is_err());
    }
}
