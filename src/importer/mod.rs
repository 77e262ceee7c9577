// ==========================================
// 机加工排产系统 - 导入层
// ==========================================
// 职责: 外部文件 → 原始行记录 → 工艺主数据 / 人员档案
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod master_importer;
pub mod personnel_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, UniversalFileParser};
pub use master_importer::{load_master_operations, map_master_rows};
pub use personnel_importer::{
    parse_personnel_profiles_from_file, parse_personnel_profiles_from_rows,
};
