use serde::Serialize;
use std::collections::HashMap;

use crate::models::Rating;

/// Aggregated view of one professor's ratings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub total_ratings: usize,
    pub avg_rating: f64,
    pub avg_difficulty: f64,
    pub top_tags: Vec<TagCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

const TOP_TAG_LIMIT: usize = 5;

/// Compute mean rating, mean difficulty, and the most frequent tags for
/// one professor's ratings. Means are rounded to one decimal place and
/// zero when there are no ratings. Tag ties keep first-encountered order.
pub fn aggregate(ratings: &[Rating]) -> RatingStats {
    if ratings.is_empty() {
        return RatingStats {
            total_ratings: 0,
            avg_rating: 0.0,
            avg_difficulty: 0.0,
            top_tags: Vec::new(),
        };
    }

    let total = ratings.len();
    let rating_sum: i64 = ratings.iter().map(|r| r.rating).sum();
    let difficulty_sum: i64 = ratings.iter().map(|r| r.difficulty).sum();

    // Count tag frequency, remembering the order tags first appeared in.
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for rating in ratings {
        for tag in &rating.tags {
            let count = counts.entry(tag.as_str()).or_insert(0);
            if *count == 0 {
                order.push(tag.as_str());
            }
            *count += 1;
        }
    }

    let mut top_tags: Vec<TagCount> = order
        .into_iter()
        .map(|tag| TagCount {
            tag: tag.to_string(),
            count: counts[tag],
        })
        .collect();
    // Stable sort keeps first-encountered order among equal counts.
    top_tags.sort_by(|a, b| b.count.cmp(&a.count));
    top_tags.truncate(TOP_TAG_LIMIT);

    RatingStats {
        total_ratings: total,
        avg_rating: round_one_decimal(rating_sum as f64 / total as f64),
        avg_difficulty: round_one_decimal(difficulty_sum as f64 / total as f64),
        top_tags,
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(score: i64, difficulty: i64, tags: &[&str]) -> Rating {
        Rating {
            id: "r".to_string(),
            professor_id: "p".to_string(),
            user_id: "u".to_string(),
            course_code: "CSCE 2100".to_string(),
            is_online: false,
            rating: score,
            difficulty,
            would_take_again: true,
            for_credit: None,
            used_textbooks: None,
            attendance_mandatory: None,
            grade: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            review: "ok".to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn empty_input_yields_zeroed_stats() {
        let stats = aggregate(&[]);
        assert_eq!(stats.total_ratings, 0);
        assert_eq!(stats.avg_rating, 0.0);
        assert_eq!(stats.avg_difficulty, 0.0);
        assert!(stats.top_tags.is_empty());
    }

    #[test]
    fn means_round_to_one_decimal() {
        let ratings = vec![
            rating(5, 2, &["Caring", "Funny"]),
            rating(3, 4, &["Caring"]),
        ];
        let stats = aggregate(&ratings);
        assert_eq!(stats.total_ratings, 2);
        assert_eq!(stats.avg_rating, 4.0);
        assert_eq!(stats.avg_difficulty, 3.0);
        assert_eq!(
            stats.top_tags,
            vec![
                TagCount {
                    tag: "Caring".to_string(),
                    count: 2
                },
                TagCount {
                    tag: "Funny".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn uneven_mean_rounds_half_up() {
        // 5 + 4 + 4 = 13, mean 4.333... -> 4.3; difficulty mean 1.666... -> 1.7
        let ratings = vec![rating(5, 2, &[]), rating(4, 2, &[]), rating(4, 1, &[])];
        let stats = aggregate(&ratings);
        assert_eq!(stats.avg_rating, 4.3);
        assert_eq!(stats.avg_difficulty, 1.7);
    }

    #[test]
    fn tag_ties_keep_first_encountered_order() {
        let ratings = vec![
            rating(4, 2, &["Funny", "Caring"]),
            rating(4, 2, &["Caring", "Funny"]),
        ];
        let stats = aggregate(&ratings);
        let tags: Vec<&str> = stats.top_tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(tags, vec!["Funny", "Caring"]);
    }

    #[test]
    fn top_tags_truncate_to_five() {
        let ratings = vec![
            rating(4, 2, &["A", "B", "C", "D"]),
            rating(4, 2, &["E", "F", "A"]),
        ];
        let stats = aggregate(&ratings);
        assert_eq!(stats.top_tags.len(), 5);
        assert_eq!(stats.top_tags[0].tag, "A");
        assert_eq!(stats.top_tags[0].count, 2);
        for tag in &stats.top_tags[1..] {
            assert_eq!(tag.count, 1);
        }
    }
}
