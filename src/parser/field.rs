/// 一行 `name:value` 拆分后的结果，借用原始行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// 以第一个 ':' 拆分一行。
///
/// - 没有 ':' 的行不是字段，返回 `None`
/// - ':' 在行首时字段名为空串；这种行不会匹配任何已知字段，
///   因此等同于被丢弃（不做 comment 特殊处理）
/// - value 为冒号之后的全部内容；紧跟冒号的单个空格会被去掉，
///   其余空白（包括行尾的 `\r`）原样保留
pub fn parse_field(line: &str) -> Option<Field<'_>> {
    let (name, rest) = line.split_once(':')?;
    let value = rest.strip_prefix(' ').unwrap_or(rest);
    Some(Field { name, value })
}
