//! スクレイプしたグリッドテキストの解析
//!
//! 抽出スクリプトは1行1レコード、セルを `|` で連結したテキストを返す。

use crate::container::ContainerNo;

use super::types::{LookupOutcome, MovementRow};

/// ポータルが明示的に「データなし」を表示したときのマーカー
pub const NODATA_CONFIRMED: &str = "NODATA_CONFIRMED";

pub const REASON_NO_HISTORY: &str = "내역 없음";
pub const REASON_EXTRACT_FAILED: &str = "데이터 추출 실패";

/// 画面にこの文言があれば照会結果は0件
pub const EMPTY_RESULT_MESSAGES: [&str; 3] = [
    "데이터가 없습니다",
    "내역이 없습니다",
    "데이터가 존재하지 않습니다",
];

/// 先頭セルが数字の行だけを移動履歴として取り出す
pub fn parse_rows(container: &ContainerNo, grid_text: &str) -> Vec<MovementRow> {
    grid_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let cells: Vec<String> = line.split('|').map(|c| c.trim().to_string()).collect();
            let first = cells.first()?;
            if first.is_empty() || !first.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some(MovementRow::new(container, cells))
        })
        .collect()
}

/// スクレイプ結果（None は抽出失敗）を照会結果に変換
pub fn outcome_from_grid(container: &ContainerNo, grid_text: Option<&str>) -> LookupOutcome {
    match grid_text {
        None => LookupOutcome::NoData(REASON_EXTRACT_FAILED.to_string()),
        Some(text) if text.trim() == NODATA_CONFIRMED => {
            LookupOutcome::NoData(REASON_NO_HISTORY.to_string())
        }
        Some(text) => {
            let rows = parse_rows(container, text);
            if rows.is_empty() {
                LookupOutcome::NoData(REASON_NO_HISTORY.to_string())
            } else {
                LookupOutcome::Found(rows)
            }
        }
    }
}

/// スクレイプスクリプトの戻り値が有効なグリッドテキストか
pub fn looks_like_grid(text: &str) -> bool {
    text.contains('|') && text.trim().len() > 10
}

/// ページ本文に0件メッセージが含まれるか
pub fn is_empty_result_page(html: &str) -> bool {
    EMPTY_RESULT_MESSAGES.iter().any(|msg| html.contains(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1|수입|반출|HJNC|2024-05-02 10:11|MAERSK KIEL|412W|MSK|F|40HC|KRPUS|CNSHA|부산12가3456|Y\n\
2|수입|반입|HJNC|2024-04-30 22:01|MAERSK KIEL|412W|MSK|F|40HC|KRPUS|CNSHA||Y\n\
No|수출입|구분\n\
\n";

    fn cn() -> ContainerNo {
        ContainerNo::parse("MSKU1234565").unwrap()
    }

    #[test]
    fn test_parse_rows_keeps_numbered_lines() {
        let rows = parse_rows(&cn(), SAMPLE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].query_no, "MSKU1234565");
        assert_eq!(rows[0].seq(), "1");
        assert_eq!(rows[0].cells[2], "반출");
        assert_eq!(rows[1].cells[12], "");
        assert!(rows[0].is_first_move());
        assert!(!rows[1].is_first_move());
    }

    #[test]
    fn test_outcome_found() {
        match outcome_from_grid(&cn(), Some(SAMPLE)) {
            LookupOutcome::Found(rows) => assert_eq!(rows.len(), 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_outcome_without_numbered_rows() {
        assert_eq!(
            outcome_from_grid(&cn(), Some("No|수출입|구분|터미널|MOVE TIME")),
            LookupOutcome::NoData(REASON_NO_HISTORY.into())
        );
    }

    #[test]
    fn test_outcome_confirmed_empty_and_missing() {
        assert_eq!(
            outcome_from_grid(&cn(), Some(NODATA_CONFIRMED)),
            LookupOutcome::NoData(REASON_NO_HISTORY.into())
        );
        assert_eq!(
            outcome_from_grid(&cn(), None),
            LookupOutcome::NoData(REASON_EXTRACT_FAILED.into())
        );
    }

    #[test]
    fn test_grid_and_empty_page_detection() {
        assert!(looks_like_grid(SAMPLE));
        assert!(!looks_like_grid("1|2"));
        assert!(!looks_like_grid("no separators in this text"));
        assert!(is_empty_result_page("<div>조회된 데이터가 없습니다.</div>"));
        assert!(!is_empty_result_page("<div>1|수입</div>"));
    }
}
