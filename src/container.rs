//! コンテナ番号 (ISO 6346)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

/// 正規化済みのコンテナ番号
///
/// 英数字以外を除去して大文字化したもの。ポータルの検索欄にそのまま入力する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerNo(String);

impl ContainerNo {
    pub fn parse(raw: &str) -> Result<Self, ScraperError> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.is_empty() {
            return Err(ScraperError::InvalidContainer(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    /// 空欄を除いてリストを正規化する（順序・重複はそのまま）
    pub fn parse_list<I, S>(values: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .filter_map(|v| Self::parse(v.as_ref()).ok())
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ISO 6346 のチェックデジット検証
    ///
    /// 所有者コード3文字 + 区分1文字 + 連番6桁 + チェックデジット1桁の形式でなければ false。
    pub fn has_valid_check_digit(&self) -> bool {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() != 11 {
            return false;
        }
        if !chars[..4].iter().all(|c| c.is_ascii_uppercase())
            || !chars[4..].iter().all(|c| c.is_ascii_digit())
        {
            return false;
        }

        let mut sum: u32 = 0;
        for (i, c) in chars[..10].iter().enumerate() {
            let value = match letter_value(*c) {
                Some(v) => v,
                None => match c.to_digit(10) {
                    Some(d) => d,
                    None => return false,
                },
            };
            sum += value << i;
        }

        let expected = sum % 11 % 10;
        chars[10].to_digit(10) == Some(expected)
    }
}

/// 英字の数値換算（11の倍数は飛ばす）
fn letter_value(c: char) -> Option<u32> {
    if !c.is_ascii_uppercase() {
        return None;
    }
    let mut value = 10;
    for _ in 'A'..c {
        value += 1;
        if value % 11 == 0 {
            value += 1;
        }
    }
    Some(value)
}

impl fmt::Display for ContainerNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContainerNo {
    type Error = ScraperError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContainerNo> for String {
    fn from(value: ContainerNo) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let cn = ContainerNo::parse(" csqu-305438 3 ").unwrap();
        assert_eq!(cn.as_str(), "CSQU3054383");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(ContainerNo::parse("").is_err());
        assert!(ContainerNo::parse(" - ").is_err());
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        let list = ContainerNo::parse_list(["abcu1234567", "", "  ", "TGHU 0000001"]);
        let values: Vec<&str> = list.iter().map(|c| c.as_str()).collect();
        assert_eq!(values, vec!["ABCU1234567", "TGHU0000001"]);
    }

    #[test]
    fn test_letter_values_skip_multiples_of_eleven() {
        assert_eq!(letter_value('A'), Some(10));
        assert_eq!(letter_value('B'), Some(12));
        assert_eq!(letter_value('K'), Some(21));
        assert_eq!(letter_value('L'), Some(23));
        assert_eq!(letter_value('V'), Some(34));
        assert_eq!(letter_value('Z'), Some(38));
        assert_eq!(letter_value('1'), None);
    }

    #[test]
    fn test_check_digit() {
        assert!(ContainerNo::parse("CSQU3054383").unwrap().has_valid_check_digit());
        assert!(!ContainerNo::parse("CSQU3054384").unwrap().has_valid_check_digit());
        assert!(!ContainerNo::parse("CSQU305438").unwrap().has_valid_check_digit());
        assert!(!ContainerNo::parse("1SQU3054383").unwrap().has_valid_check_digit());
    }

    #[test]
    fn test_serde_uses_normalized_string() {
        let cn: ContainerNo = serde_json::from_str("\"csqu 3054383\"").unwrap();
        assert_eq!(serde_json::to_string(&cn).unwrap(), "\"CSQU3054383\"");
        assert!(serde_json::from_str::<ContainerNo>("\"  \"").is_err());
    }
}
