//! Агрегатор прогресса: чистые функции без побочных эффектов.
//!
//! Сохранение результата — ответственность вызывающей стороны
//! (repository/service).

use crate::domain::a002_key_result::aggregate::KeyResult;

/// Прогресс цели: доля выполненных ключевых результатов, 0-100.
///
/// Пустой набор даёт 0.
pub fn objective_progress(key_results: &[KeyResult]) -> i32 {
    if key_results.is_empty() {
        return 0;
    }
    let total = key_results.len();
    let completed = key_results.iter().filter(|kr| kr.is_completed).count();
    (100.0 * completed as f64 / total as f64).round() as i32
}

/// Процент выполнения ключевого результата: current/target, 0-100.
///
/// Неположительный target даёт 0.
pub fn completion_percentage(current: f64, target: f64) -> i32 {
    if target <= 0.0 {
        return 0;
    }
    ((100.0 * current / target).round() as i32).clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a001_objective::aggregate::ObjectiveId;

    fn kr(is_completed: bool) -> KeyResult {
        let mut kr = KeyResult::new_for_insert(
            ObjectiveId::new_v4(),
            "user".to_string(),
            "kr".to_string(),
            None,
            10.0,
            None,
            None,
            0,
        );
        kr.is_completed = is_completed;
        kr
    }

    #[test]
    fn empty_set_gives_zero_progress() {
        assert_eq!(objective_progress(&[]), 0);
    }

    #[test]
    fn progress_is_rounded_share_of_completed() {
        let set = vec![kr(true), kr(true), kr(false), kr(false)];
        assert_eq!(objective_progress(&set), 50);

        let set = vec![kr(true), kr(false), kr(false)];
        assert_eq!(objective_progress(&set), 33);

        let set = vec![kr(true), kr(true), kr(false)];
        assert_eq!(objective_progress(&set), 67);

        let set = vec![kr(true), kr(true), kr(true)];
        assert_eq!(objective_progress(&set), 100);
    }

    #[test]
    fn non_positive_target_gives_zero_percentage() {
        assert_eq!(completion_percentage(5.0, 0.0), 0);
        assert_eq!(completion_percentage(5.0, -1.0), 0);
    }

    #[test]
    fn percentage_is_clamped_to_0_100() {
        assert_eq!(completion_percentage(20.0, 10.0), 100);
        assert_eq!(completion_percentage(-3.0, 10.0), 0);
    }

    #[test]
    fn percentage_is_rounded_ratio() {
        assert_eq!(completion_percentage(1.0, 3.0), 33);
        assert_eq!(completion_percentage(2.0, 3.0), 67);
        assert_eq!(completion_percentage(5.0, 10.0), 50);
        assert_eq!(completion_percentage(0.0, 10.0), 0);
        assert_eq!(completion_percentage(10.0, 10.0), 100);
    }
}
