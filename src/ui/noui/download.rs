use anyhow::Result;

use crate::download::models::{MediaCandidate, Mode};
use crate::download::probe::format_size_mb;

pub(super) fn candidate_line(idx: usize, candidate: &MediaCandidate) -> String {
    format!(
        "{}. {} ({} MB)",
        idx,
        candidate.quality_label(),
        format_size_mb(candidate.size_bytes())
    )
}

/// 列出候选视频并读取编号；输入 0 / q 取消，无效输入重新询问。
pub(super) fn pick_candidate<F>(
    candidates: &[MediaCandidate],
    mut read: F,
) -> Result<Option<&MediaCandidate>>
where
    F: FnMut(&str) -> Result<String>,
{
    println!("\n===== 可用画质 =====");
    for (idx, c) in candidates.iter().enumerate() {
        println!("{}", candidate_line(idx + 1, c));
    }
    println!("0. 取消\n");

    loop {
        let input = read("请选择画质编号：")?;
        match parse_choice(&input, candidates.len()) {
            Choice::Index(i) => return Ok(candidates.get(i - 1)),
            Choice::Cancel => return Ok(None),
            Choice::Invalid => println!("输入无效，请重新输入"),
        }
    }
}

pub(super) fn pick_mode<F>(mut read: F) -> Result<Option<Mode>>
where
    F: FnMut(&str) -> Result<String>,
{
    println!("\n===== 保存方式 =====");
    for (idx, mode) in Mode::ALL.iter().enumerate() {
        println!("{}. {}", idx + 1, mode.menu_title());
    }
    println!("0. 取消\n");

    loop {
        let input = read("请选择保存方式：")?;
        match parse_choice(&input, Mode::ALL.len()) {
            Choice::Index(i) => return Ok(Some(Mode::ALL[i - 1])),
            Choice::Cancel => return Ok(None),
            Choice::Invalid => println!("输入无效，请重新输入"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    /// 1 开始
    Index(usize),
    Cancel,
    Invalid,
}

fn parse_choice(input: &str, max: usize) -> Choice {
    let text = input.trim();
    if text == "0" || text.eq_ignore_ascii_case("q") {
        return Choice::Cancel;
    }
    match text.parse::<usize>() {
        Ok(idx) if (1..=max).contains(&idx) => Choice::Index(idx),
        _ => Choice::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn scripted(lines: &[&str]) -> impl FnMut(&str) -> Result<String> {
        let mut queue: VecDeque<String> = lines.iter().map(|s| s.to_string()).collect();
        move |_prompt: &str| Ok(queue.pop_front().unwrap_or_else(|| "q".to_string()))
    }

    fn candidates() -> Vec<MediaCandidate> {
        vec![
            MediaCandidate::new("https://v/1.mp4".into(), "720p".into(), Some(3 * 1024 * 1024)),
            MediaCandidate::new("https://v/2.mp4".into(), "360p".into(), None),
        ]
    }

    #[test]
    fn menu_lines() {
        let c = candidates();
        assert_eq!(candidate_line(1, &c[0]), "1. 720p (3.0 MB)");
        assert_eq!(candidate_line(2, &c[1]), "2. 360p (? MB)");
    }

    #[test]
    fn choice_parsing() {
        assert_eq!(parse_choice(" 2\n", 3), Choice::Index(2));
        assert_eq!(parse_choice("0", 3), Choice::Cancel);
        assert_eq!(parse_choice("Q", 3), Choice::Cancel);
        assert_eq!(parse_choice("4", 3), Choice::Invalid);
        assert_eq!(parse_choice("abc", 3), Choice::Invalid);
        assert_eq!(parse_choice("", 3), Choice::Invalid);
    }

    #[test]
    fn invalid_input_is_asked_again() {
        let c = candidates();
        let picked = pick_candidate(&c, scripted(&["9", "x", "2"])).unwrap();
        assert_eq!(picked.map(|c| c.quality_label()), Some("360p"));
    }

    #[test]
    fn mode_menu_follows_declared_order() {
        assert_eq!(pick_mode(scripted(&["1"])).unwrap(), Some(Mode::PassThrough));
        assert_eq!(pick_mode(scripted(&["2"])).unwrap(), Some(Mode::StripAudio));
        assert_eq!(pick_mode(scripted(&["3"])).unwrap(), Some(Mode::ExtractAudio));
        assert_eq!(pick_mode(scripted(&["0"])).unwrap(), None);
    }
}
