//! Excel 入出力
//!
//! 書式・色付けはしない。Sheet1 = 最新の移動のみ、Sheet2 = 全行。

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::container::ContainerNo;
use crate::error::ScraperError;
use crate::etrans::{MovementRow, HEADERS};
use crate::runner::SearchReport;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// 照会リスト様式の見出し
pub const TEMPLATE_HEADER: &str = "컨테이너넘버";
pub const TEMPLATE_FILE_NAME: &str = "container_list_양식.xlsx";

/// 出力ファイル名（els_hyper_MMDD_HHMM.xlsx）
pub fn default_file_name() -> String {
    format!(
        "els_hyper_{}.xlsx",
        chrono::Local::now().format("%m%d_%H%M")
    )
}

fn write_sheet(
    worksheet: &mut Worksheet,
    name: &str,
    rows: &[MovementRow],
) -> Result<(), ScraperError> {
    worksheet.set_name(name)?;
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, value) in row.to_cells().iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r, col as u16, value.as_str())?;
            }
        }
    }
    Ok(())
}

/// 照会結果をxlsxにする
pub fn write_report(report: &SearchReport) -> Result<Vec<u8>, ScraperError> {
    let mut workbook = Workbook::new();
    write_sheet(workbook.add_worksheet(), "Sheet1", &report.first_moves())?;
    write_sheet(workbook.add_worksheet(), "Sheet2", &report.rows)?;
    Ok(workbook.save_to_buffer()?)
}

/// 照会リスト様式（見出し + 空行1行）
pub fn template() -> Result<Vec<u8>, ScraperError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1")?;
    worksheet.write_string(0, 0, TEMPLATE_HEADER)?;
    worksheet.write_string(1, 0, "")?;
    Ok(workbook.save_to_buffer()?)
}

/// 照会リストを読む。先頭シートのA列、2行目以降（空欄は飛ばす）
///
/// 以前の実装は見出しの次の行（A2）も読み飛ばしていたが、ここでは A2 から読む。
pub fn parse_container_list(bytes: &[u8]) -> Result<Vec<ContainerNo>, ScraperError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Vec::new()),
    };

    let Some((end_row, _)) = range.end() else {
        return Ok(Vec::new());
    };

    let values = (1..=end_row).filter_map(|row| match range.get_value((row, 0)) {
        Some(Data::Empty) | None => None,
        Some(Data::Float(f)) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Some(cell) => Some(cell.to_string()),
    });
    Ok(ContainerNo::parse_list(values))
}
