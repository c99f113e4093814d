// ==========================================
// 学校教务核心 - 工号/学号生成规则
// ==========================================
// 格式: <前缀><年份><3位序号>，如 STU2024001
// 序号超过 999 时按实际位数输出
// ==========================================

pub struct IdentifierGenerator;

impl IdentifierGenerator {
    pub fn format(prefix: &str, year: i32, seq: i64) -> String {
        format!("{}{}{:03}", prefix.trim().to_uppercase(), year, seq)
    }

    /// 序号前缀（用于统计已有数量）
    pub fn stem(prefix: &str, year: i32) -> String {
        format!("{}{}", prefix.trim().to_uppercase(), year)
    }

    /// 从 existing_count + 1 开始找第一个未被占用的编号
    pub fn next_available<E>(
        prefix: &str,
        year: i32,
        existing_count: i64,
        mut is_taken: impl FnMut(&str) -> Result<bool, E>,
    ) -> Result<String, E> {
        let mut seq = existing_count + 1;
        loop {
            let candidate = Self::format(prefix, year, seq);
            if !is_taken(&candidate)? {
                return Ok(candidate);
            }
            seq += 1;
        }
    }
}
