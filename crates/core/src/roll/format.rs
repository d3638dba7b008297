use super::evaluator::RollOutcome;
use super::parser::RollRequest;

pub fn format_roll(request: &RollRequest, user: &str, outcome: &RollOutcome) -> String {
    let die_word = if request.count == 1 { "die" } else { "dice" };
    let results =
        outcome.results.iter().map(|value| value.to_string()).collect::<Vec<_>>().join(",  ");

    let mut message = format!(
        "_{user} rolled {count} {sides}-sided {die_word}:_  *{sum}*  ( {results} )",
        count = request.count,
        sides = request.sides,
        sum = outcome.sum,
    );

    if let Some(modifier) = request.modifier {
        message.push_str(&format!("  {} {}", modifier.sign, modifier.amount));
    }

    if request.hit_threshold.is_some() {
        message.push_str(&format!(
            "  with {hits} {hit_word}{hit_crit} and {misses} {miss_word}{miss_crit}",
            hits = outcome.hits,
            hit_word = if outcome.hits == 1 { "hit" } else { "hits" },
            hit_crit = critical_suffix(outcome.hits_critical),
            misses = outcome.misses,
            miss_word = if outcome.misses == 1 { "miss" } else { "misses" },
            miss_crit = critical_suffix(outcome.misses_critical),
        ));
    }

    message
}

fn critical_suffix(criticals: u32) -> String {
    if criticals == 0 {
        String::new()
    } else {
        format!(" ({criticals} critical)")
    }
}
