// ==========================================
// 营销后台 - 文件解析器
// ==========================================
// 阶段 0: 文件读取与解析
// 支持: 分隔符文本（UTF-8,首行表头,分隔符可配置）
// 结构错误（编码/表头/行长度不一致）为批级错误
// ==========================================

use crate::domain::import::RawRecord;
use crate::importer::error::{ImportError, ImportResult};
use csv::{ReaderBuilder, StringRecord};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// ==========================================
// ImportSource - 导入来源
// ==========================================
#[derive(Debug, Clone)]
pub enum ImportSource {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl ImportSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        ImportSource::Path(path.as_ref().to_path_buf())
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        ImportSource::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    /// 文件名（含扩展名,用于诊断与分类）
    pub fn file_name(&self) -> String {
        match self {
            ImportSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            ImportSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// 文件名去掉扩展名
    pub fn file_stem(&self) -> String {
        let name = self.file_name();
        Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or(name)
    }

    /// 读取全部字节（异步）
    pub async fn read(&self) -> ImportResult<Vec<u8>> {
        match self {
            ImportSource::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    ImportError::FileNotFound(path.display().to_string())
                } else {
                    ImportError::FileReadError {
                        file: self.file_name(),
                        message: e.to_string(),
                    }
                }
            }),
            ImportSource::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

// ==========================================
// DelimitedParser
// ==========================================
pub struct DelimitedParser {
    delimiter: u8,
}

impl DelimitedParser {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// 解析表头
    ///
    /// # 错误
    /// - FileStructure: 非 UTF-8 / 空文件 / 空列名
    pub fn parse_header(&self, file: &str, data: &[u8]) -> ImportResult<Vec<String>> {
        let text = decode(file, data)?;
        let mut reader = self.reader(text);
        let headers = reader
            .headers()
            .map_err(|e| structure_error(file, e.to_string()))?;
        normalize_headers(file, headers)
    }

    /// 解析全部数据行
    ///
    /// # 返回
    /// - 按行号升序的原始记录,已跳过整行空白
    pub fn parse_records(&self, file: &str, data: &[u8]) -> ImportResult<Vec<RawRecord>> {
        let text = decode(file, data)?;
        let mut reader = self.reader(text);
        let headers = {
            let raw = reader
                .headers()
                .map_err(|e| structure_error(file, e.to_string()))?;
            normalize_headers(file, raw)?
        };

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let row = result.map_err(|e| structure_error(file, e.to_string()))?;
            let line = row
                .position()
                .map(|p| p.line())
                .unwrap_or(idx as u64 + 2);

            let mut record = RawRecord::new(line);
            for (header, value) in headers.iter().zip(row.iter()) {
                record.push(header.as_str(), value);
            }

            // 跳过完全空白的行
            if record.is_blank() {
                continue;
            }
            records.push(record);
        }

        Ok(records)
    }

    fn reader<'a>(&self, text: &'a str) -> csv::Reader<&'a [u8]> {
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes())
    }
}

fn decode<'a>(file: &str, data: &'a [u8]) -> ImportResult<&'a str> {
    let text = std::str::from_utf8(data)
        .map_err(|e| structure_error(file, format!("不是有效的 UTF-8 文本: {}", e)))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn normalize_headers(file: &str, raw: &StringRecord) -> ImportResult<Vec<String>> {
    let headers: Vec<String> = raw.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(structure_error(file, "缺少表头行".to_string()));
    }
    if let Some(pos) = headers.iter().position(|h| h.is_empty()) {
        return Err(structure_error(file, format!("第 {} 列列名为空", pos + 1)));
    }
    Ok(headers)
}

fn structure_error(file: &str, message: String) -> ImportError {
    ImportError::FileStructure {
        file: file.to_string(),
        message,
    }
}
