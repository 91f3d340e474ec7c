use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::render_json;
    use crate::calc::LeaderboardEntry;

    #[test]
    fn leaderboard_uses_camel_case_keys() {
        let rendered = render_json(&[LeaderboardEntry {
            user_id: "alice".to_string(),
            total_reduction: 12.42,
            average_recyc: 50.0,
        }])
        .unwrap();
        assert!(rendered.contains("\"userId\": \"alice\""));
        assert!(rendered.contains("\"totalReduction\": 12.42"));
        assert!(rendered.contains("\"averageRecyc\": 50.0"));
    }
}
