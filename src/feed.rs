// Read-only projections over activities - chart totals and the photo gallery

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::activity::{Activity, ActivityId, Category};
use crate::identity::UserId;

/// Minutes logged in one category on one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCategoryTotal {
    pub day: NaiveDate,
    pub category: Category,
    pub total_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub activity_id: ActivityId,
    pub image_ref: String,
    pub caption: String,
}

fn selected<'a>(
    activities: &'a [Activity],
    user: Option<&'a UserId>,
) -> impl Iterator<Item = &'a Activity> + 'a {
    activities
        .iter()
        .filter(move |a| user.map_or(true, |u| &a.owner == u))
}

/// Sum minutes per (local day, category). Combinations with no activity are
/// omitted; rows are ordered by day, then category.
pub fn aggregate_minutes_by_day_and_category(
    activities: &[Activity],
    user: Option<&UserId>,
    tz: Option<Tz>,
) -> Vec<DailyCategoryTotal> {
    let tz = tz.unwrap_or(Tz::UTC);
    let mut totals: BTreeMap<(NaiveDate, Category), u64> = BTreeMap::new();

    for activity in selected(activities, user) {
        let Some(at) = activity.occurred_at else {
            continue;
        };
        let day = at.with_timezone(&tz).date_naive();
        *totals.entry((day, activity.category)).or_default() +=
            u64::from(activity.duration_minutes);
    }

    totals
        .into_iter()
        .map(|((day, category), total_minutes)| DailyCategoryTotal {
            day,
            category,
            total_minutes,
        })
        .collect()
}

/// Expand sparse totals into a full day x category grid, filling gaps with zero.
/// Days run from the first to the last day present.
pub fn densify(totals: &[DailyCategoryTotal]) -> Vec<DailyCategoryTotal> {
    let (Some(first), Some(last)) = (
        totals.iter().map(|t| t.day).min(),
        totals.iter().map(|t| t.day).max(),
    ) else {
        return Vec::new();
    };

    let known: BTreeMap<(NaiveDate, Category), u64> = totals
        .iter()
        .map(|t| ((t.day, t.category), t.total_minutes))
        .collect();

    first
        .iter_days()
        .take_while(|d| *d <= last)
        .flat_map(|day| {
            let known = &known;
            Category::ALL.iter().map(move |&category| DailyCategoryTotal {
                day,
                category,
                total_minutes: known.get(&(day, category)).copied().unwrap_or(0),
            })
        })
        .collect()
}

/// Activities that carry an image, in input order, with a display caption.
pub fn image_gallery(
    activities: &[Activity],
    user: Option<&UserId>,
    tz: Option<Tz>,
) -> Vec<GalleryItem> {
    let tz = tz.unwrap_or(Tz::UTC);

    selected(activities, user)
        .filter_map(|activity| {
            let image_ref = activity.image_url.as_deref().map(str::trim)?;
            if image_ref.is_empty() {
                return None;
            }
            Some(GalleryItem {
                activity_id: activity.id.clone(),
                image_ref: image_ref.to_string(),
                caption: caption(activity, tz),
            })
        })
        .collect()
}

fn caption(activity: &Activity, tz: Tz) -> String {
    let when = activity
        .occurred_at
        .map(|at| at.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!(
        "{} ({}) • {} • {} • {} min",
        activity.name, activity.category, activity.owner_label, when, activity.duration_minutes
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn activity(
        id: &str,
        owner: &str,
        category: Category,
        minutes: u32,
        at: (u32, u32),
    ) -> Activity {
        Activity {
            id: ActivityId::new(id),
            owner: UserId::new(owner),
            owner_label: owner.to_uppercase(),
            name: format!("act-{}", id),
            category,
            duration_minutes: minutes,
            occurred_at: Some(Utc.with_ymd_and_hms(2025, 1, at.0, at.1, 0, 0).unwrap()),
            image_url: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_sums_and_omits_empty_combinations() {
        let acts = vec![
            activity("1", "alex", Category::PhysicalWorkout, 30, (1, 8)),
            activity("2", "alex", Category::PhysicalWorkout, 15, (1, 18)),
            activity("3", "alex", Category::MentalWorkout, 10, (2, 9)),
        ];

        let totals = aggregate_minutes_by_day_and_category(&acts, None, None);
        assert_eq!(
            totals,
            vec![
                DailyCategoryTotal {
                    day: day(1),
                    category: Category::PhysicalWorkout,
                    total_minutes: 45
                },
                DailyCategoryTotal {
                    day: day(2),
                    category: Category::MentalWorkout,
                    total_minutes: 10
                },
            ]
        );
        assert!(totals.iter().all(|t| t.total_minutes > 0));
    }

    #[test]
    fn test_orders_by_day_then_category() {
        let acts = vec![
            activity("1", "alex", Category::Others, 5, (3, 8)),
            activity("2", "alex", Category::CreativeExercise, 5, (2, 8)),
            activity("3", "alex", Category::PhysicalWorkout, 5, (3, 9)),
        ];
        let keys: Vec<(NaiveDate, Category)> =
            aggregate_minutes_by_day_and_category(&acts, None, None)
                .into_iter()
                .map(|t| (t.day, t.category))
                .collect();
        assert_eq!(
            keys,
            vec![
                (day(2), Category::CreativeExercise),
                (day(3), Category::PhysicalWorkout),
                (day(3), Category::Others),
            ]
        );
    }

    #[test]
    fn test_user_filter_and_unreadable_timestamps() {
        let mut legacy = activity("3", "alex", Category::Others, 99, (1, 8));
        legacy.occurred_at = None;
        let acts = vec![
            activity("1", "alex", Category::Others, 10, (1, 8)),
            activity("2", "sam", Category::Others, 20, (1, 8)),
            legacy,
        ];

        let alex = UserId::new("alex");
        let totals = aggregate_minutes_by_day_and_category(&acts, Some(&alex), None);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total_minutes, 10);

        let everyone = aggregate_minutes_by_day_and_category(&acts, None, None);
        assert_eq!(everyone[0].total_minutes, 30);
    }

    #[test]
    fn test_display_timezone_moves_day_boundary() {
        // 23:00 UTC on the 1st is the 2nd in Tokyo
        let acts = vec![activity("1", "alex", Category::Others, 10, (1, 23))];
        let utc = aggregate_minutes_by_day_and_category(&acts, None, None);
        assert_eq!(utc[0].day, day(1));

        let tokyo = aggregate_minutes_by_day_and_category(&acts, None, Some(chrono_tz::Asia::Tokyo));
        assert_eq!(tokyo[0].day, day(2));
    }

    #[test]
    fn test_densify_fills_grid() {
        let acts = vec![
            activity("1", "alex", Category::PhysicalWorkout, 45, (1, 8)),
            activity("2", "alex", Category::MentalWorkout, 10, (3, 8)),
        ];
        let sparse = aggregate_minutes_by_day_and_category(&acts, None, None);
        let grid = densify(&sparse);

        assert_eq!(grid.len(), 3 * Category::ALL.len());
        assert_eq!(grid[0].category, Category::PhysicalWorkout);
        assert_eq!(grid[0].total_minutes, 45);
        let middle_day: u64 = grid
            .iter()
            .filter(|t| t.day == day(2))
            .map(|t| t.total_minutes)
            .sum();
        assert_eq!(middle_day, 0);
        assert!(densify(&[]).is_empty());
    }

    #[test]
    fn test_gallery_keeps_images_in_order() {
        let mut a = activity("1", "alex", Category::CreativeExercise, 30, (4, 14));
        a.image_url = Some("/images/one.png".into());
        let b = activity("2", "alex", Category::Others, 5, (3, 8));
        let mut c = activity("3", "sam", Category::Others, 5, (2, 8));
        c.image_url = Some("/images/three.jpg".into());
        let mut d = activity("4", "sam", Category::Others, 5, (1, 8));
        d.image_url = Some("  ".into());

        let gallery = image_gallery(&[a, b, c, d], None, None);
        let refs: Vec<&str> = gallery.iter().map(|g| g.image_ref.as_str()).collect();
        assert_eq!(refs, vec!["/images/one.png", "/images/three.jpg"]);
        assert_eq!(
            gallery[0].caption,
            "act-1 (Creative Exercise) • ALEX • 2025-01-04 14:00 • 30 min"
        );
    }

    #[test]
    fn test_gallery_caption_uses_display_timezone() {
        let mut a = activity("1", "alex", Category::MentalWorkout, 20, (4, 14));
        a.image_url = Some("/images/one.png".into());
        let gallery = image_gallery(
            std::slice::from_ref(&a),
            Some(&UserId::new("alex")),
            Some(chrono_tz::America::New_York),
        );
        assert!(gallery[0].caption.contains("2025-01-04 09:00"));

        assert!(image_gallery(&[a], Some(&UserId::new("sam")), None).is_empty());
    }
}
