use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DomainGroup
// ---------------------------------------------------------------------------

/// Top-level taxonomy partition. Decides which attributes, conditions and
/// product types are valid for a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainGroup {
    Tech,
    Car,
}

impl DomainGroup {
    pub const ALL: [DomainGroup; 2] = [DomainGroup::Tech, DomainGroup::Car];

    /// Group used when a label is missing or not recognised.
    pub const FALLBACK: DomainGroup = DomainGroup::Tech;

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainGroup::Tech => "tech",
            DomainGroup::Car => "car",
        }
    }

    /// Resolve a stored or configured label, falling back to
    /// [`DomainGroup::FALLBACK`] with a warning for anything unrecognised.
    pub fn resolve(raw: &str) -> DomainGroup {
        match raw.parse() {
            Ok(group) => group,
            Err(_) => {
                tracing::warn!(
                    group = raw,
                    fallback = DomainGroup::FALLBACK.as_str(),
                    "Unrecognised domain group, using fallback"
                );
                DomainGroup::FALLBACK
            }
        }
    }
}

impl fmt::Display for DomainGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tech" => Ok(DomainGroup::Tech),
            "car" => Ok(DomainGroup::Car),
            other => Err(format!("unknown domain group: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    High,
    HighMedium,
    Medium,
    MediumLow,
    Low,
}

impl Confidence {
    pub const ALL: [Confidence; 5] = [
        Confidence::High,
        Confidence::HighMedium,
        Confidence::Medium,
        Confidence::MediumLow,
        Confidence::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::HighMedium => "high-medium",
            Confidence::Medium => "medium",
            Confidence::MediumLow => "medium-low",
            Confidence::Low => "low",
        }
    }

    /// Only `high` and `high-medium` extractions become products.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Confidence::High | Confidence::HighMedium)
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Scrape,
    Processing,
    Pipeline,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Scrape => "scrape",
            RunKind::Processing => "processing",
            RunKind::Pipeline => "pipeline",
        }
    }
}

impl FromStr for RunKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scrape" => Ok(RunKind::Scrape),
            "processing" => Ok(RunKind::Processing),
            "pipeline" => Ok(RunKind::Pipeline),
            other => Err(format!("unknown run kind: {other}")),
        }
    }
}

/// Sub-step labels shown on a running full-pipeline run.
pub mod steps {
    pub const SCRAPING: &str = "Step 1/3: Scraping...";
    pub const LABELING: &str = "Step 2/3: Labeling...";
    pub const PROCESSING: &str = "Step 3/3: Processing...";
}

// ---------------------------------------------------------------------------
// MediaRole
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaRole {
    HighRes,
    MidRes,
    Video,
    Frame,
}

impl MediaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaRole::HighRes => "high-res",
            MediaRole::MidRes => "mid-res",
            MediaRole::Video => "video",
            MediaRole::Frame => "frame",
        }
    }
}

impl FromStr for MediaRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high-res" => Ok(MediaRole::HighRes),
            "mid-res" => Ok(MediaRole::MidRes),
            "video" => Ok(MediaRole::Video),
            "frame" => Ok(MediaRole::Frame),
            other => Err(format!("unknown media role: {other}")),
        }
    }
}
