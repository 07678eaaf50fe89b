//! ETRANS 関連の型定義

use serde::{Deserialize, Serialize};

use crate::container::ContainerNo;

/// 出力列（先頭は照会番号、残り14列はポータルのグリッド列）
pub const HEADERS: [&str; 15] = [
    "조회번호",
    "No",
    "수출입",
    "구분",
    "터미널",
    "MOVE TIME",
    "모선",
    "항차",
    "선사",
    "적공",
    "SIZE",
    "POD",
    "POL",
    "차량번호",
    "RFID",
];

/// グリッドの列数
pub const GRID_COLUMNS: usize = HEADERS.len() - 1;

pub const NODATA_MARKER: &str = "NODATA";
pub const ERROR_MARKER: &str = "ERROR";

/// 移動履歴の1行
///
/// JSONでは15要素の文字列配列としてシリアライズする。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", from = "Vec<String>")]
pub struct MovementRow {
    pub query_no: String,
    /// グリッドの14列（No, 수출입, 구분, ...）
    pub cells: Vec<String>,
}

impl MovementRow {
    /// グリッドのセルから行を作る（14列に揃える）
    pub fn new(container: &ContainerNo, cells: impl IntoIterator<Item = String>) -> Self {
        let mut cells: Vec<String> = cells.into_iter().take(GRID_COLUMNS).collect();
        cells.resize(GRID_COLUMNS, String::new());
        Self {
            query_no: container.to_string(),
            cells,
        }
    }

    pub fn no_data(container: &ContainerNo, reason: &str) -> Self {
        Self::new(
            container,
            [NODATA_MARKER.to_string(), reason.to_string()],
        )
    }

    pub fn error(container: &ContainerNo, message: &str) -> Self {
        Self::new(container, [ERROR_MARKER.to_string(), message.to_string()])
    }

    /// No 列
    pub fn seq(&self) -> &str {
        self.cells.first().map(String::as_str).unwrap_or_default()
    }

    /// 最新の移動（No = 1）か
    pub fn is_first_move(&self) -> bool {
        self.seq() == "1"
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.seq(), NODATA_MARKER | ERROR_MARKER)
    }

    /// 出力用の15セル
    pub fn to_cells(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(HEADERS.len());
        out.push(self.query_no.clone());
        out.extend(self.cells.iter().cloned());
        out
    }
}

impl From<MovementRow> for Vec<String> {
    fn from(row: MovementRow) -> Self {
        let mut out = Vec::with_capacity(HEADERS.len());
        out.push(row.query_no);
        out.extend(row.cells);
        out
    }
}

impl From<Vec<String>> for MovementRow {
    fn from(values: Vec<String>) -> Self {
        let mut iter = values.into_iter();
        let query_no = iter.next().unwrap_or_default();
        let mut cells: Vec<String> = iter.take(GRID_COLUMNS).collect();
        cells.resize(GRID_COLUMNS, String::new());
        Self { query_no, cells }
    }
}

/// 1件の照会結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(Vec<MovementRow>),
    NoData(String),
    Failed(String),
}

impl LookupOutcome {
    /// 出力行に変換（データなし・エラーも1行として残す）
    pub fn into_rows(self, container: &ContainerNo) -> Vec<MovementRow> {
        match self {
            LookupOutcome::Found(rows) => rows,
            LookupOutcome::NoData(reason) => vec![MovementRow::no_data(container, &reason)],
            LookupOutcome::Failed(message) => vec![MovementRow::error(container, &message)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cn() -> ContainerNo {
        ContainerNo::parse("CSQU3054383").unwrap()
    }

    #[test]
    fn test_row_is_padded_to_grid_width() {
        let row = MovementRow::new(&cn(), vec!["1".to_string(), "수입".to_string()]);
        assert_eq!(row.cells.len(), GRID_COLUMNS);
        assert_eq!(row.to_cells().len(), HEADERS.len());
        assert!(row.is_first_move());
        assert!(!row.is_placeholder());
    }

    #[test]
    fn test_row_is_truncated_to_grid_width() {
        let cells = (0..20).map(|i| i.to_string());
        let row = MovementRow::new(&cn(), cells);
        assert_eq!(row.cells.len(), GRID_COLUMNS);
        assert_eq!(row.cells.last().map(String::as_str), Some("13"));
    }

    #[test]
    fn test_placeholder_rows() {
        let rows = LookupOutcome::NoData("내역 없음".into()).into_rows(&cn());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].seq(), NODATA_MARKER);
        assert_eq!(rows[0].cells[1], "내역 없음");
        assert!(rows[0].is_placeholder());

        let rows = LookupOutcome::Failed("INPUT_NOT_FOUND".into()).into_rows(&cn());
        assert_eq!(rows[0].seq(), ERROR_MARKER);
        assert!(!rows[0].is_first_move());
    }

    #[test]
    fn test_row_serializes_as_array() {
        let row = MovementRow::new(&cn(), vec!["2".to_string(), "수출".to_string()]);
        let json = serde_json::to_value(&row).unwrap();
        let array = json.as_array().unwrap();
        assert_eq!(array.len(), 15);
        assert_eq!(array[0], "CSQU3054383");
        assert_eq!(array[2], "수출");
    }
}
