use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Source file reference embedded in a frame line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Directory part including the trailing separator, possibly empty.
    pub directory: String,
    pub file_name: String,
    pub line: Option<u32>,
}

impl SourceLocation {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.directory, self.file_name))
    }
}

/// The pieces of one raw frame description line.
///
/// Frame lines look like
/// `# 3 app.exe!alloc_node [/src/tree/node.c:42] (0x0040a1b2 <app.exe+0xa1b2>)`;
/// the bracketed location and the function name are both optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub module: String,
    pub function: Option<String>,
    pub location: Option<SourceLocation>,
    pub address: Option<String>,
}

impl FrameInfo {
    /// Parse a frame line. Never fails: unknown parts come back as `None`
    /// (or `"?"` for the module).
    pub fn parse(line: &str) -> Self {
        let (module, function) = match line.split_once('!') {
            Some((head, tail)) => {
                let module = head.split_whitespace().last().unwrap_or("?").to_string();
                let end = if has_location(line) {
                    tail.find(" [")
                } else {
                    tail.find(" (0x")
                };
                let name = end.map_or(tail, |e| &tail[..e]).trim();
                let function = (!name.is_empty()).then(|| name.to_string());
                (module, function)
            }
            None => ("?".to_string(), None),
        };

        Self {
            module,
            function,
            location: parse_location(line),
            address: parse_address(line),
        }
    }

    pub fn function_name(&self) -> &str {
        self.function.as_deref().unwrap_or("?")
    }
}

fn has_location(line: &str) -> bool {
    line.contains('[') && line.contains(']')
}

fn parse_location(line: &str) -> Option<SourceLocation> {
    let open = line.find('[')?;
    let close = open + line[open..].find(']')?;
    let inner = line[open + 1..close].trim();
    if inner.is_empty() {
        return None;
    }
    let (directory, file_part) = match inner.rfind('/') {
        Some(slash) => (&inner[..=slash], &inner[slash + 1..]),
        None => ("", inner),
    };
    let (file_name, line_num) = match file_part.rsplit_once(':') {
        Some((file, num)) => match num.trim().parse::<u32>() {
            Ok(n) => (file, Some(n)),
            Err(_) => (file_part, None),
        },
        None => (file_part, None),
    };
    Some(SourceLocation {
        directory: directory.to_string(),
        file_name: file_name.to_string(),
        line: line_num,
    })
}

fn parse_address(line: &str) -> Option<String> {
    let start = line.find("(0x")? + 1;
    let rest = &line[start..];
    let end = rest.rfind(')').unwrap_or(rest.len());
    let address = rest[..end].trim();
    (!address.is_empty()).then(|| address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_with_location() {
        let f = FrameInfo::parse(
            "# 3 app.exe!alloc_node   [/src/tree/node.c:42] (0x0040a1b2 <app.exe+0xa1b2>)",
        );
        assert_eq!(f.module, "app.exe");
        assert_eq!(f.function_name(), "alloc_node");
        let loc = f.location.unwrap();
        assert_eq!(loc.directory, "/src/tree/");
        assert_eq!(loc.file_name, "node.c");
        assert_eq!(loc.line, Some(42));
        assert_eq!(loc.path(), PathBuf::from("/src/tree/node.c"));
        assert_eq!(f.address.as_deref(), Some("0x0040a1b2 <app.exe+0xa1b2>"));
    }

    #[test]
    fn parses_frame_without_location() {
        let f = FrameInfo::parse("# 0 libc.so.6!malloc (0x00007f00 <libc.so.6+0x84234>)");
        assert_eq!(f.module, "libc.so.6");
        assert_eq!(f.function_name(), "malloc");
        assert!(f.location.is_none());
        assert_eq!(f.address.as_deref(), Some("0x00007f00 <libc.so.6+0x84234>"));
    }

    #[test]
    fn tolerates_unrecognized_lines() {
        let f = FrameInfo::parse("<not in a module>");
        assert_eq!(f.module, "?");
        assert_eq!(f.function_name(), "?");
        assert!(f.location.is_none());
        assert!(f.address.is_none());
    }
}
