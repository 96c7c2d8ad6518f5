//! Request cost estimation.
//!
//! Cost is the whitespace-separated word count scaled by a fixed overhead
//! factor of 1.3, rounded down. It stands in for the resource demand a
//! request puts on a backend.

/// Overhead factor numerator (1.3 = 13 / 10).
const OVERHEAD_NUMERATOR: u64 = 13;

/// Overhead factor denominator.
const OVERHEAD_DENOMINATOR: u64 = 10;

/// Estimate the cost of a prompt.
///
/// Integer arithmetic keeps the floor exact for every word count.
pub fn estimate_cost(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    words * OVERHEAD_NUMERATOR / OVERHEAD_DENOMINATOR
}

/// A single text-generation request with its memoized cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    text: String,
    estimated_cost: u64,
}

impl Request {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let estimated_cost = estimate_cost(&text);
        Self {
            text,
            estimated_cost,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn estimated_cost(&self) -> u64 {
        self.estimated_cost
    }
}

impl From<&str> for Request {
    fn from(text: &str) -> Self {
        Request::new(text)
    }
}

impl From<String> for Request {
    fn from(text: String) -> Self {
        Request::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_costs_nothing() {
        assert_eq!(estimate_cost(""), 0);
        assert_eq!(estimate_cost("   \n\t "), 0);
    }

    #[test]
    fn test_rounds_down() {
        assert_eq!(estimate_cost("hello"), 1);
        assert_eq!(estimate_cost("hello world"), 2);
        assert_eq!(estimate_cost("one two three"), 3);
        assert_eq!(estimate_cost("a b c d e f g h i j"), 13);
    }

    #[test]
    fn test_whitespace_runs_count_once() {
        assert_eq!(estimate_cost("hello   world\n"), estimate_cost("hello world"));
    }

    #[test]
    fn test_monotonic_in_word_count() {
        let mut text = String::new();
        let mut previous = 0;
        for _ in 0..500 {
            text.push_str("word ");
            let cost = estimate_cost(&text);
            assert!(cost >= previous, "cost decreased at {} words", text.len() / 5);
            previous = cost;
        }
        assert_eq!(previous, 650);
    }

    #[test]
    fn test_request_memoizes_cost() {
        let request = Request::new("hello world");
        assert_eq!(request.text(), "hello world");
        assert_eq!(request.estimated_cost(), 2);
        assert_eq!(Request::from("hello world"), request);
    }
}
