//! Word-level tokenizer shared by documents and queries.
//!
//! Text is segmented on Unicode word boundaries (UAX #29), so `crypto_birb`,
//! `don't` and `0.05` each stay one word. Segments without a letter or digit
//! are dropped and the rest are lower-cased. UAX #29 cuts between every pair
//! of ideographs; adjacent ideographs are glued back into one run, and a run
//! never shares a token with Latin or digit text.

use unicode_segmentation::UnicodeSegmentation;

fn is_cjk_ideograph(c: char) -> bool {
	matches!(c as u32,
		0x3400..=0x4DBF
		| 0x4E00..=0x9FFF
		| 0xF900..=0xFAFF
		| 0x20000..=0x2A6DF
		| 0x2A700..=0x2EBEF
		| 0x2F800..=0x2FA1F
		| 0x30000..=0x3134F)
}

fn is_cjk_run(token: &str) -> bool { token.chars().next().is_some_and(is_cjk_ideograph) }

fn push_split(token: &str, out: &mut Vec<String>) {
	let mut start = 0;
	let mut current: Option<bool> = None;
	for (i, c) in token.char_indices() {
		let cjk = is_cjk_ideograph(c);
		match current {
			Some(prev) if prev != cjk => {
				out.push(token[start..i].to_string());
				start = i;
			}
			_ => {}
		}
		current = Some(cjk);
	}
	if start < token.len() {
		out.push(token[start..].to_string());
	}
}

pub fn tokenize(text: &str) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();
	// byte offset where the last emitted ideograph run ended in `text`
	let mut run_end: Option<usize> = None;
	let mut parts = Vec::new();
	for (start, word) in text.split_word_bound_indices() {
		if !word.chars().any(char::is_alphanumeric) {
			run_end = None;
			continue;
		}
		parts.clear();
		push_split(&word.to_lowercase(), &mut parts);
		for (i, part) in parts.drain(..).enumerate() {
			let glue = i == 0 && run_end == Some(start) && is_cjk_run(&part);
			match out.last_mut() {
				Some(last) if glue => last.push_str(&part),
				_ => out.push(part),
			}
		}
		run_end = out.last().filter(|t| is_cjk_run(t)).map(|_| start + word.len());
	}
	out
}

/// Inverse direction used for indexing: tokens separated by single spaces.
pub fn tokenize_join(tokens: &[String]) -> String { tokens.join(" ") }

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lowercases_and_splits_on_punctuation() {
		assert_eq!(tokenize("Fed RATE-cut, $BTC!"), vec!["fed", "rate", "cut", "btc"]);
	}

	#[test]
	fn word_boundaries_keep_handles_contractions_and_decimals() {
		assert_eq!(tokenize("crypto_birb"), vec!["crypto_birb"]);
		assert_eq!(tokenize("@Crypto_Birb says"), vec!["crypto_birb", "says"]);
		assert_eq!(tokenize("don't"), vec!["don't"]);
		assert_eq!(tokenize("ETH 0.05"), vec!["eth", "0.05"]);
	}

	#[test]
	fn empty_and_symbol_only_inputs() {
		assert!(tokenize("").is_empty());
		assert!(tokenize("  ... !!! ").is_empty());
	}

	#[test]
	fn cjk_runs_are_separate_tokens() {
		assert_eq!(tokenize("btc比特币rally"), vec!["btc", "比特币", "rally"]);
		assert_eq!(tokenize("美联储 降息"), vec!["美联储", "降息"]);
		assert_eq!(tokenize("美联储，降息"), vec!["美联储", "降息"]);
	}

	#[test]
	fn ascii_round_trip_is_stable() {
		for s in ["Liquidity is BACK; risk-on!", "ETH/BTC 0.05 breakout", "a  b\tc\nd", "don't fade crypto_birb"] {
			let once = tokenize(s);
			assert_eq!(tokenize(&tokenize_join(&once)), once, "input {s:?}");
		}
	}
}
