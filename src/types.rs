use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// One row of the housing table exactly as it appears in the CSV.
///
/// Every field is optional text; the loader decides what is required and
/// how lenient to be with each value.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Project")]
    pub project: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "Move-in date")]
    pub move_in_date: Option<String>,
    #[serde(rename = "Market Rate Rentals")]
    pub market_rate_rentals: Option<String>,
    #[serde(rename = "Affordable Rentals")]
    pub affordable_rentals: Option<String>,
    #[serde(rename = "Market Rate Owner")]
    pub market_rate_owner: Option<String>,
    #[serde(rename = "Affordable Owner")]
    pub affordable_owner: Option<String>,
    #[serde(rename = "Total units")]
    pub total_units: Option<String>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<String>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<String>,
    #[serde(rename = "Property address")]
    pub property_address: Option<String>,
    #[serde(rename = "Market rate")]
    pub market_rate: Option<String>,
    #[serde(rename = "City project info")]
    pub city_project_info: Option<String>,
    #[serde(rename = "Media")]
    pub media: Option<String>,
    #[serde(rename = "Notes")]
    pub notes: Option<String>,
}

/// Columns the normalizer cannot work without.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "Project",
    "Status",
    "Move-in date",
    "Market Rate Rentals",
    "Affordable Rentals",
    "Market Rate Owner",
    "Affordable Owner",
    "Total units",
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ProjectStatus {
    Potential,
    Concept,
    Design,
    Permitting,
    Approved,
    UnderConstruction,
    Completed,
    Other(String),
    Unknown,
}

impl ProjectStatus {
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label.map(str::trim).filter(|s| !s.is_empty()) else {
            return ProjectStatus::Unknown;
        };
        match label.to_ascii_lowercase().as_str() {
            "potential" => ProjectStatus::Potential,
            "concept" | "conceptual" => ProjectStatus::Concept,
            "design" => ProjectStatus::Design,
            "permitting" => ProjectStatus::Permitting,
            "approved" => ProjectStatus::Approved,
            "under construction" | "construction" => ProjectStatus::UnderConstruction,
            "completed" | "complete" => ProjectStatus::Completed,
            _ => ProjectStatus::Other(label.to_string()),
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Potential => write!(f, "Potential"),
            ProjectStatus::Concept => write!(f, "Concept"),
            ProjectStatus::Design => write!(f, "Design"),
            ProjectStatus::Permitting => write!(f, "Permitting"),
            ProjectStatus::Approved => write!(f, "Approved"),
            ProjectStatus::UnderConstruction => write!(f, "Under construction"),
            ProjectStatus::Completed => write!(f, "Completed"),
            ProjectStatus::Other(s) => write!(f, "{}", s),
            ProjectStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Unit counts for one project or one year, in every category the
/// dashboard tracks. `total` always equals `rental + owner`, which in turn
/// equals `affordable + market_rate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnitCounts {
    pub rental: u64,
    pub owner: u64,
    pub affordable: u64,
    pub market_rate: u64,
    pub total: u64,
}

impl UnitCounts {
    pub fn from_breakdown(
        market_rate_rental: u64,
        affordable_rental: u64,
        market_rate_owner: u64,
        affordable_owner: u64,
    ) -> Self {
        let rental = market_rate_rental.saturating_add(affordable_rental);
        let owner = market_rate_owner.saturating_add(affordable_owner);
        UnitCounts {
            rental,
            owner,
            affordable: affordable_rental.saturating_add(affordable_owner),
            market_rate: market_rate_rental.saturating_add(market_rate_owner),
            total: rental.saturating_add(owner),
        }
    }

    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Rental => self.rental,
            Category::Owner => self.owner,
            Category::Affordable => self.affordable,
            Category::MarketRate => self.market_rate,
            Category::Total => self.total,
        }
    }

    pub fn add(&mut self, other: &UnitCounts) {
        self.rental = self.rental.saturating_add(other.rental);
        self.owner = self.owner.saturating_add(other.owner);
        self.affordable = self.affordable.saturating_add(other.affordable);
        self.market_rate = self.market_rate.saturating_add(other.market_rate);
        self.total = self.total.saturating_add(other.total);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Rental,
    Owner,
    Affordable,
    MarketRate,
    Total,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Rental,
        Category::Owner,
        Category::Affordable,
        Category::MarketRate,
        Category::Total,
    ];

    /// Categories that carry a policy goal of their own.
    pub const GOAL_TRACKED: [Category; 2] = [Category::Rental, Category::Owner];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Rental => "Rental Units",
            Category::Owner => "Owner Units",
            Category::Affordable => "Affordable Units",
            Category::MarketRate => "Market Rate Units",
            Category::Total => "Total",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub name: String,
    pub status: ProjectStatus,
    pub completion_year: Option<i32>,
    /// Move-in field as written in the source, kept for display.
    pub move_in_text: Option<String>,
    pub units: UnitCounts,
    /// The "Total units" column, which the source maintains by hand.
    pub listed_total: Option<u64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub address: Option<String>,
    pub market_rate_note: Option<String>,
    pub project_info_url: Option<String>,
    pub media_url: Option<String>,
    pub notes: Option<String>,
}

/// One calendar year on the regularized axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearBucket {
    pub year: i32,
    pub added: UnitCounts,
    pub cumulative: UnitCounts,
    /// Whether at least one record completes in this year.
    pub observed: bool,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct YearProgressRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "NewRental")]
    #[tabled(rename = "NewRental")]
    pub new_rental: String,
    #[serde(rename = "NewOwner")]
    #[tabled(rename = "NewOwner")]
    pub new_owner: String,
    #[serde(rename = "CumulativeRental")]
    #[tabled(rename = "CumulativeRental")]
    pub cumulative_rental: String,
    #[serde(rename = "CumulativeOwner")]
    #[tabled(rename = "CumulativeOwner")]
    pub cumulative_owner: String,
    #[serde(rename = "CumulativeAffordable")]
    #[tabled(rename = "CumulativeAffordable")]
    pub cumulative_affordable: String,
    #[serde(rename = "CumulativeTotal")]
    #[tabled(rename = "CumulativeTotal")]
    pub cumulative_total: String,
    #[serde(rename = "RentalGoalLine")]
    #[tabled(rename = "RentalGoalLine")]
    pub rental_goal_line: String,
    #[serde(rename = "OwnerGoalLine")]
    #[tabled(rename = "OwnerGoalLine")]
    pub owner_goal_line: String,
    #[serde(rename = "ProjectedRental")]
    #[tabled(rename = "ProjectedRental")]
    pub projected_rental: String,
    #[serde(rename = "ProjectedOwner")]
    #[tabled(rename = "ProjectedOwner")]
    pub projected_owner: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GoalDeficitRow {
    #[serde(rename = "HousingType")]
    #[tabled(rename = "HousingType")]
    pub housing_type: String,
    #[serde(rename = "Goal")]
    #[tabled(rename = "Goal")]
    pub goal: String,
    #[serde(rename = "CurrentPlanned")]
    #[tabled(rename = "CurrentPlanned")]
    pub current_planned: String,
    #[serde(rename = "Progress")]
    #[tabled(rename = "Progress")]
    pub progress: String,
    #[serde(rename = "CurrentDeficit")]
    #[tabled(rename = "CurrentDeficit")]
    pub current_deficit: String,
    #[serde(rename = "ProjectedForTarget")]
    #[tabled(rename = "ProjectedForTarget")]
    pub projected: String,
    #[serde(rename = "ProjectedDeficit")]
    #[tabled(rename = "ProjectedDeficit")]
    pub projected_deficit: String,
    #[serde(rename = "NeededPerYear")]
    #[tabled(rename = "NeededPerYear")]
    pub needed_per_year: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MarkerRow {
    #[serde(rename = "Project")]
    #[tabled(rename = "Project")]
    pub project: String,
    #[serde(rename = "Latitude")]
    #[tabled(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    #[tabled(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Color")]
    #[tabled(rename = "Color")]
    pub color: String,
    #[serde(rename = "Dominance")]
    #[tabled(rename = "Dominance")]
    pub dominance: String,
    #[serde(rename = "Address")]
    #[tabled(rename = "Address")]
    pub address: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "MoveIn")]
    #[tabled(rename = "MoveIn")]
    pub move_in: String,
    #[serde(rename = "RentalUnits")]
    #[tabled(rename = "RentalUnits")]
    pub rental_units: u64,
    #[serde(rename = "OwnerUnits")]
    #[tabled(rename = "OwnerUnits")]
    pub owner_units: u64,
    #[serde(rename = "TotalUnits")]
    #[tabled(rename = "TotalUnits")]
    pub total_units: u64,
    #[serde(rename = "MarketRate")]
    #[tabled(skip)]
    pub market_rate: String,
    #[serde(rename = "CityProjectInfo")]
    #[tabled(skip)]
    pub city_project_info: String,
    #[serde(rename = "Media")]
    #[tabled(skip)]
    pub media: String,
    #[serde(rename = "Notes")]
    #[tabled(skip)]
    pub notes: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StatusRow {
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Projects")]
    #[tabled(rename = "Projects")]
    pub projects: usize,
    #[serde(rename = "TotalUnits")]
    #[tabled(rename = "TotalUnits")]
    pub total_units: String,
}

#[derive(Debug, Serialize)]
pub struct TrendSummary {
    pub category: Category,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub projected_at_target: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub rental_goal: u64,
    pub owner_goal: u64,
    pub target_year: i32,
    pub current_year: i32,
    pub total_projects: usize,
    pub rows_without_year: usize,
    pub undated_units: u64,
    pub mismatched_totals: usize,
    pub first_year: i32,
    pub last_observed_year: i32,
    pub goals: Vec<crate::goals::GoalStatus>,
    pub trends: Vec<TrendSummary>,
}
