// src/engine/scoring.rs

//! Point awards, accuracy grading and end-of-game statistics.
//!
//! Everything here is pure. Points are integers; the difficulty multiplier is
//! applied in tenths so the floor is exact.

use serde::{Deserialize, Serialize};

pub const BASE_POINTS: i64 = 100;

pub const MAX_TIME_BONUS: f64 = 50.0;
/// Below this fraction of the time limit no speed bonus is granted.
pub const TIME_BONUS_THRESHOLD: f64 = 0.25;

pub const MIN_STREAK: u32 = 3;
pub const BONUS_PER_STREAK: i64 = 25;
pub const MAX_STREAK_MULTIPLIER: f64 = 2.0;

pub const PERFECT_BONUS: i64 = 500;

/// Game mode chosen before a level starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Casual,
    Challenge,
    Blitz,
}

impl Difficulty {
    /// Accepts the legacy keys `timed` and `expert`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "casual" => Some(Self::Casual),
            "challenge" | "timed" => Some(Self::Challenge),
            "blitz" | "expert" => Some(Self::Blitz),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Challenge => "challenge",
            Self::Blitz => "blitz",
        }
    }

    /// Seconds per question; `None` is untimed.
    pub fn time_limit(self) -> Option<u32> {
        match self {
            Self::Casual => None,
            Self::Challenge => Some(20),
            Self::Blitz => Some(10),
        }
    }

    fn multiplier_tenths(self) -> i64 {
        match self {
            Self::Casual => 10,
            Self::Challenge => 13,
            Self::Blitz => 15,
        }
    }

    pub fn multiplier(self) -> f64 {
        self.multiplier_tenths() as f64 / 10.0
    }
}

fn multiplier_tenths_for(key: &str) -> i64 {
    Difficulty::from_key(key).map_or(10, Difficulty::multiplier_tenths)
}

/// Multiplier for a difficulty key; unknown keys score as casual.
pub fn difficulty_multiplier(key: &str) -> f64 {
    multiplier_tenths_for(key) as f64 / 10.0
}

/// Speed bonus: `floor(50 * log2(1 + remaining/limit))`, zero when untimed,
/// expired, or answered with less than a quarter of the time left.
pub fn calculate_time_bonus(time_remaining: u32, time_limit: Option<u32>) -> i64 {
    let limit = match time_limit {
        Some(limit) if limit > 0 => limit,
        _ => return 0,
    };
    if time_remaining == 0 {
        return 0;
    }

    let ratio = f64::from(time_remaining) / f64::from(limit);
    if ratio < TIME_BONUS_THRESHOLD {
        return 0;
    }

    (MAX_TIME_BONUS * (1.0 + ratio).log2()).floor() as i64
}

/// Streak bonus for the run *before* the current answer. Caps at 50.
pub fn calculate_streak_bonus(current_streak: u32) -> i64 {
    if current_streak < MIN_STREAK {
        return 0;
    }

    let bonus = i64::from(current_streak - MIN_STREAK + 1) * BONUS_PER_STREAK;
    let cap = (BONUS_PER_STREAK as f64 * MAX_STREAK_MULTIPLIER) as i64;
    bonus.min(cap)
}

/// Components behind one answer's points, for the answer-result display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub base: i64,
    pub time_bonus: i64,
    pub streak_bonus: i64,
    pub difficulty_multiplier: f64,
    pub penalty: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionScore {
    pub points: i64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerEvent<'a> {
    pub is_correct: bool,
    pub time_remaining: u32,
    pub time_limit: Option<u32>,
    /// Streak before this answer is counted.
    pub current_streak: u32,
    pub difficulty: &'a str,
}

/// Tunable part of the scoring rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringRules {
    /// Deducted on a wrong answer. Defaults to 0.
    pub wrong_penalty: i64,
}

impl ScoringRules {
    pub fn question_score(&self, event: AnswerEvent<'_>) -> QuestionScore {
        if !event.is_correct {
            let penalty = -self.wrong_penalty;
            return QuestionScore {
                points: penalty,
                breakdown: ScoreBreakdown {
                    base: 0,
                    time_bonus: 0,
                    streak_bonus: 0,
                    difficulty_multiplier: 0.0,
                    penalty,
                    total: penalty,
                },
            };
        }

        let tenths = multiplier_tenths_for(event.difficulty);
        let time_bonus = calculate_time_bonus(event.time_remaining, event.time_limit);
        let streak_bonus = calculate_streak_bonus(event.current_streak);

        let subtotal = BASE_POINTS + time_bonus + streak_bonus;
        let points = subtotal * tenths / 10;

        QuestionScore {
            points,
            breakdown: ScoreBreakdown {
                base: BASE_POINTS,
                time_bonus,
                streak_bonus,
                difficulty_multiplier: tenths as f64 / 10.0,
                penalty: 0,
                total: points,
            },
        }
    }
}

/// Scores one answer under the default rules (no wrong-answer penalty).
pub fn calculate_question_score(event: AnswerEvent<'_>) -> QuestionScore {
    ScoringRules::default().question_score(event)
}

/// Consecutive-correct tracking for one game session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl StreakState {
    pub fn record_correct(&mut self) {
        self.current_streak += 1;
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }

    /// Wrong answer or timeout.
    pub fn reset(&mut self) {
        self.current_streak = 0;
    }
}

/// Post-game letter grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
    F,
    #[serde(rename = "N/A")]
    NotRated,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
            Self::NotRated => "N/A",
        }
    }

    pub fn rating(self) -> &'static str {
        match self {
            Self::APlus => "Perfect",
            Self::A => "Excellent",
            Self::BPlus => "Very Good",
            Self::B => "Good",
            Self::CPlus => "Above Average",
            Self::C => "Average",
            Self::D => "Below Average",
            Self::F => "Needs Improvement",
            Self::NotRated => "Not Rated",
        }
    }

    /// Grade-display stars. Not the level-completion stars.
    pub fn stars(self) -> u8 {
        match self {
            Self::APlus | Self::A => 5,
            Self::BPlus | Self::B => 4,
            Self::CPlus | Self::C => 3,
            Self::D => 2,
            Self::F => 1,
            Self::NotRated => 0,
        }
    }

    fn from_percentage(percentage: f64) -> Self {
        if percentage >= 100.0 {
            Self::APlus
        } else if percentage >= 90.0 {
            Self::A
        } else if percentage >= 80.0 {
            Self::BPlus
        } else if percentage >= 70.0 {
            Self::B
        } else if percentage >= 60.0 {
            Self::CPlus
        } else if percentage >= 50.0 {
            Self::C
        } else if percentage >= 40.0 {
            Self::D
        } else {
            Self::F
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyReport {
    /// Rounded to one decimal.
    pub percentage: f64,
    pub grade: Grade,
    pub rating: &'static str,
    pub stars: u8,
    pub correct_answers: u32,
    pub total_questions: u32,
}

/// Accuracy and grade for a finished game. Over-counted answers are clamped.
pub fn calculate_accuracy(correct_answers: u32, total_questions: u32) -> AccuracyReport {
    if total_questions == 0 {
        let grade = Grade::NotRated;
        return AccuracyReport {
            percentage: 0.0,
            grade,
            rating: grade.rating(),
            stars: grade.stars(),
            correct_answers: 0,
            total_questions: 0,
        };
    }

    let valid_correct = correct_answers.min(total_questions);
    let percentage =
        (f64::from(valid_correct) / f64::from(total_questions) * 100.0).min(100.0);
    let grade = Grade::from_percentage(percentage);

    AccuracyReport {
        percentage: (percentage * 10.0).round() / 10.0,
        grade,
        rating: grade.rating(),
        stars: grade.stars(),
        correct_answers: valid_correct,
        total_questions,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformanceRating {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Master,
}

impl PerformanceRating {
    pub fn from_score(final_score: i64) -> Self {
        match final_score {
            s if s >= 3000 => Self::Master,
            s if s >= 2000 => Self::Expert,
            s if s >= 1000 => Self::Advanced,
            s if s >= 500 => Self::Intermediate,
            _ => Self::Beginner,
        }
    }
}

/// End-of-game summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub final_score: i64,
    pub accuracy: AccuracyReport,
    pub perfect_bonus: i64,
    pub avg_points_per_question: i64,
    pub longest_streak: u32,
    pub performance_rating: PerformanceRating,
    pub difficulty: String,
}

/// Folds the perfect-game bonus into the running total and floors it at zero.
pub fn calculate_game_stats(
    correct_answers: u32,
    total_questions: u32,
    total_score: i64,
    difficulty: &str,
    longest_streak: u32,
) -> GameStats {
    let accuracy = calculate_accuracy(correct_answers, total_questions);
    let perfect_bonus = if accuracy.percentage >= 100.0 {
        PERFECT_BONUS
    } else {
        0
    };
    let final_score = (total_score + perfect_bonus).max(0);

    let avg_points_per_question = if total_questions > 0 {
        (final_score as f64 / f64::from(total_questions)).round() as i64
    } else {
        0
    };

    GameStats {
        final_score,
        accuracy,
        perfect_bonus,
        avg_points_per_question,
        longest_streak,
        performance_rating: PerformanceRating::from_score(final_score),
        difficulty: difficulty.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct(time_remaining: u32, time_limit: Option<u32>, streak: u32, difficulty: &str) -> i64 {
        calculate_question_score(AnswerEvent {
            is_correct: true,
            time_remaining,
            time_limit,
            current_streak: streak,
            difficulty,
        })
        .points
    }

    #[test]
    fn test_time_bonus_edges() {
        assert_eq!(calculate_time_bonus(0, Some(20)), 0);
        assert_eq!(calculate_time_bonus(20, Some(20)), 50);
        assert_eq!(calculate_time_bonus(10, None), 0);
        assert_eq!(calculate_time_bonus(10, Some(0)), 0);
        // 4/20 = 0.2 is under the threshold
        assert_eq!(calculate_time_bonus(4, Some(20)), 0);
        // 5/20 = 0.25: floor(50 * log2(1.25)) = 16
        assert_eq!(calculate_time_bonus(5, Some(20)), 16);
        // 10/20 = 0.5: floor(50 * log2(1.5)) = 29
        assert_eq!(calculate_time_bonus(10, Some(20)), 29);
    }

    #[test]
    fn test_streak_bonus_threshold_and_cap() {
        assert_eq!(calculate_streak_bonus(0), 0);
        assert_eq!(calculate_streak_bonus(2), 0);
        assert_eq!(calculate_streak_bonus(3), 25);
        assert_eq!(calculate_streak_bonus(4), 50);
        assert_eq!(calculate_streak_bonus(100), 50);
    }

    #[test]
    fn test_difficulty_multiplier_table() {
        assert_eq!(difficulty_multiplier("casual"), 1.0);
        assert_eq!(difficulty_multiplier("challenge"), 1.3);
        assert_eq!(difficulty_multiplier("blitz"), 1.5);
        assert_eq!(difficulty_multiplier("timed"), 1.3);
        assert_eq!(difficulty_multiplier("expert"), 1.5);
        assert_eq!(difficulty_multiplier("nightmare"), 1.0);
    }

    #[test]
    fn test_correct_answer_points() {
        // casual, untimed, no streak
        assert_eq!(correct(0, None, 0, "casual"), 100);
        // challenge: floor((100 + 50 + 25) * 1.3) = 227
        assert_eq!(correct(20, Some(20), 3, "challenge"), 227);
        // blitz: floor((100 + 50 + 25) * 1.5) = 262
        assert_eq!(correct(10, Some(10), 3, "blitz"), 262);
    }

    #[test]
    fn test_wrong_answer_breakdown() {
        let event = AnswerEvent {
            is_correct: false,
            time_remaining: 10,
            time_limit: Some(10),
            current_streak: 7,
            difficulty: "blitz",
        };

        let default_score = calculate_question_score(event);
        assert_eq!(default_score.points, 0);
        assert_eq!(default_score.breakdown.base, 0);
        assert_eq!(default_score.breakdown.difficulty_multiplier, 0.0);

        let strict = ScoringRules { wrong_penalty: 30 }.question_score(event);
        assert_eq!(strict.points, -30);
        assert_eq!(strict.breakdown.penalty, -30);
        assert_eq!(strict.breakdown.total, -30);
    }

    #[test]
    fn test_points_floor_and_monotonicity() {
        for difficulty in ["casual", "challenge", "blitz", "unknown"] {
            for limit in [None, Some(10), Some(20)] {
                let max_time = limit.unwrap_or(0);

                let mut previous = i64::MIN;
                for remaining in 0..=max_time {
                    let points = correct(remaining, limit, 1, difficulty);
                    assert!(points >= BASE_POINTS);
                    assert!(points >= previous);
                    previous = points;
                }

                let mut previous = i64::MIN;
                for streak in 0..10 {
                    let points = correct(max_time, limit, streak, difficulty);
                    assert!(points >= previous);
                    previous = points;
                }
            }
        }
    }

    #[test]
    fn test_streak_state() {
        let mut streak = StreakState::default();
        streak.record_correct();
        streak.record_correct();
        streak.record_correct();
        streak.reset();
        streak.record_correct();

        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 3);
    }

    #[test]
    fn test_accuracy_degenerate() {
        let report = calculate_accuracy(0, 0);
        assert_eq!(report.percentage, 0.0);
        assert_eq!(report.grade.as_str(), "N/A");
        assert_eq!(report.stars, 0);
    }

    #[test]
    fn test_accuracy_clamps_over_count() {
        let report = calculate_accuracy(21, 20);
        assert_eq!(report.percentage, 100.0);
        assert_eq!(report.grade, Grade::APlus);
        assert_eq!(report.correct_answers, 20);
        assert_eq!(report.stars, 5);
    }

    #[test]
    fn test_accuracy_grade_table() {
        let cases = [
            (20, Grade::APlus, "Perfect", 5),
            (18, Grade::A, "Excellent", 5),
            (16, Grade::BPlus, "Very Good", 4),
            (14, Grade::B, "Good", 4),
            (12, Grade::CPlus, "Above Average", 3),
            (10, Grade::C, "Average", 3),
            (8, Grade::D, "Below Average", 2),
            (7, Grade::F, "Needs Improvement", 1),
            (0, Grade::F, "Needs Improvement", 1),
        ];

        for (correct, grade, rating, stars) in cases {
            let report = calculate_accuracy(correct, 20);
            assert_eq!(report.grade, grade, "correct = {}", correct);
            assert_eq!(report.rating, rating);
            assert_eq!(report.stars, stars);
        }
    }

    #[test]
    fn test_accuracy_rounds_to_one_decimal() {
        assert_eq!(calculate_accuracy(2, 3).percentage, 66.7);
        assert_eq!(calculate_accuracy(1, 3).percentage, 33.3);
    }

    #[test]
    fn test_game_stats_perfect_bonus() {
        let stats = calculate_game_stats(10, 10, 1500, "casual", 10);
        assert_eq!(stats.perfect_bonus, PERFECT_BONUS);
        assert_eq!(stats.final_score, 2000);
        assert_eq!(stats.avg_points_per_question, 200);
        assert_eq!(stats.performance_rating, PerformanceRating::Expert);

        let stats = calculate_game_stats(5, 10, -40, "casual", 2);
        assert_eq!(stats.perfect_bonus, 0);
        assert_eq!(stats.final_score, 0);
        assert_eq!(stats.performance_rating, PerformanceRating::Beginner);
    }
}
