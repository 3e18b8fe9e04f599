// Activity domain types - pure validation, no side effects
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::identity::UserId;
use crate::time_utils;

pub const MIN_DURATION_MINUTES: i64 = 1;
pub const MAX_DURATION_MINUTES: i64 = 1440;
pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Physical Workout")]
    PhysicalWorkout,
    #[serde(rename = "Mental Workout")]
    MentalWorkout,
    #[serde(rename = "Creative Exercise")]
    CreativeExercise,
    #[serde(rename = "Others", alias = "Other")]
    Others,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::PhysicalWorkout,
        Category::MentalWorkout,
        Category::CreativeExercise,
        Category::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhysicalWorkout => "Physical Workout",
            Self::MentalWorkout => "Mental Workout",
            Self::CreativeExercise => "Creative Exercise",
            Self::Others => "Others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "Other" {
            return Ok(Self::Others);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub String);

impl ActivityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An activity as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: ActivityId,
    pub owner: UserId,
    pub owner_label: String,
    pub name: String,
    pub category: Category,
    pub duration_minutes: u32,
    /// `None` only for stored values that could not be parsed
    pub occurred_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

/// A validated activity ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub owner: UserId,
    pub name: String,
    pub category: Category,
    pub duration_minutes: u32,
    pub occurred_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

impl ActivityRecord {
    pub fn into_activity(self, owner_label: &str) -> Activity {
        Activity {
            id: self.id,
            owner: self.owner,
            owner_label: owner_label.to_string(),
            name: self.name,
            category: self.category,
            duration_minutes: self.duration_minutes,
            occurred_at: Some(self.occurred_at),
            image_url: self.image_url,
        }
    }
}

/// Raw fields for a new activity, as entered.
#[derive(Debug, Clone, Default)]
pub struct ActivityDraft {
    pub name: String,
    pub category: String,
    pub duration_minutes: i64,
    /// Defaults to today in the entry timezone
    pub date: Option<NaiveDate>,
    /// Defaults to midnight
    pub time: Option<NaiveTime>,
    /// IANA name of the timezone the date/time were entered in; UTC when absent
    pub timezone: Option<String>,
}

/// Field changes for an existing activity. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub duration_minutes: Option<i64>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    /// Timezone the patched date/time are read in; UTC when absent.
    ///
    /// The stored occurrence keeps no entry timezone, so when only one of
    /// `date` or `time` is patched the other half is taken from the stored
    /// instant as seen in this timezone. Callers editing a time entered
    /// elsewhere than UTC must resend the original timezone, or the local
    /// date may shift.
    pub timezone: Option<String>,
    pub remove_image: bool,
}

impl ActivityPatch {
    fn touches_occurrence(&self) -> bool {
        self.date.is_some() || self.time.is_some()
    }
}

/// Rules applied to every write.
#[derive(Debug, Clone, Copy)]
pub struct ActivityRules {
    /// Reject occurrences on a later calendar day than "today" in the entry timezone
    pub reject_future_dates: bool,
}

impl Default for ActivityRules {
    fn default() -> Self {
        Self {
            reject_future_dates: true,
        }
    }
}

pub fn validate_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Please enter an activity name".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Activity name must be {} characters or less",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

pub fn validate_category(raw: &str) -> Result<Category, AppError> {
    raw.parse().map_err(AppError::Validation)
}

pub fn validate_duration(minutes: i64) -> Result<u32, AppError> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(AppError::Validation(format!(
            "Duration must be between {} and {} minutes",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )));
    }
    Ok(minutes as u32)
}

fn entry_timezone(raw: Option<&str>) -> Result<Tz, AppError> {
    Ok(time_utils::parse_timezone(raw)
        .map_err(AppError::Validation)?
        .unwrap_or(Tz::UTC))
}

fn occurrence(
    date: NaiveDate,
    time: NaiveTime,
    tz: Tz,
    now: DateTime<Utc>,
    rules: ActivityRules,
) -> Result<DateTime<Utc>, AppError> {
    if rules.reject_future_dates && date > time_utils::local_today(now, tz) {
        return Err(AppError::Validation(
            "Activity date cannot be in the future".into(),
        ));
    }
    time_utils::combine_local(date, time, tz).ok_or_else(|| {
        AppError::Validation(format!("{} {} does not exist in {}", date, time, tz))
    })
}

impl ActivityDraft {
    /// Validate every field and build the record to insert.
    pub fn validate(
        &self,
        id: ActivityId,
        owner: UserId,
        now: DateTime<Utc>,
        rules: ActivityRules,
    ) -> Result<ActivityRecord, AppError> {
        let name = validate_name(&self.name)?;
        let category = validate_category(&self.category)?;
        let duration_minutes = validate_duration(self.duration_minutes)?;

        let tz = entry_timezone(self.timezone.as_deref())?;
        let date = self
            .date
            .unwrap_or_else(|| time_utils::local_today(now, tz));
        let time = self.time.unwrap_or(NaiveTime::MIN);
        let occurred_at = occurrence(date, time, tz, now, rules)?;

        Ok(ActivityRecord {
            id,
            owner,
            name,
            category,
            duration_minutes,
            occurred_at,
            image_url: None,
        })
    }
}

impl Activity {
    /// Merge a patch into this activity and validate the result.
    ///
    /// A new date or time is combined with the untouched half of the stored
    /// occurrence, both read in the patch's timezone.
    pub fn apply_patch(
        &self,
        patch: &ActivityPatch,
        now: DateTime<Utc>,
        rules: ActivityRules,
    ) -> Result<ActivityRecord, AppError> {
        let tz = entry_timezone(patch.timezone.as_deref())?;
        let name = match &patch.name {
            Some(n) => validate_name(n)?,
            None => self.name.clone(),
        };
        let category = match &patch.category {
            Some(c) => validate_category(c)?,
            None => self.category,
        };
        let duration_minutes = match patch.duration_minutes {
            Some(d) => validate_duration(d)?,
            None => self.duration_minutes,
        };

        let occurred_at = if patch.touches_occurrence() {
            let current = self.occurred_at.map(|dt| dt.with_timezone(&tz));
            let date = match (patch.date, current) {
                (Some(d), _) => d,
                (None, Some(cur)) => cur.date_naive(),
                (None, None) => {
                    return Err(AppError::Validation(
                        "A date is required to change the time".into(),
                    ))
                }
            };
            let time = patch
                .time
                .or_else(|| current.map(|cur| cur.time()))
                .unwrap_or(NaiveTime::MIN);
            occurrence(date, time, tz, now, rules)?
        } else {
            self.occurred_at.ok_or_else(|| {
                AppError::Validation("Stored date is unreadable; please enter a new date".into())
            })?
        };

        Ok(ActivityRecord {
            id: self.id.clone(),
            owner: self.owner.clone(),
            name,
            category,
            duration_minutes,
            occurred_at,
            image_url: if patch.remove_image {
                None
            } else {
                self.image_url.clone()
            },
        })
    }
}
