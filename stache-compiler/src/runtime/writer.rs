use serde_json::Value;

/// Output buffer handed to helpers. Text written through
/// [`EncodedWriter::write_encoded`] is HTML encoded unless encoding was
/// disabled for the engine.
#[derive(Debug, Default)]
pub struct EncodedWriter {
    buffer: String,
    encode: bool,
}

impl EncodedWriter {
    pub fn new(encode: bool) -> Self {
        Self {
            buffer: String::new(),
            encode,
        }
    }

    pub fn write_safe(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn write_encoded(&mut self, text: &str) {
        if !self.encode {
            self.buffer.push_str(text);
            return;
        }
        for ch in text.chars() {
            match ch {
                '&' => self.buffer.push_str("&amp;"),
                '<' => self.buffer.push_str("&lt;"),
                '>' => self.buffer.push_str("&gt;"),
                '"' => self.buffer.push_str("&quot;"),
                '\'' => self.buffer.push_str("&#x27;"),
                '`' => self.buffer.push_str("&#x60;"),
                '=' => self.buffer.push_str("&#x3D;"),
                other => self.buffer.push(other),
            }
        }
    }

    pub fn write_value(&mut self, value: &Value, escaped: bool) {
        let text = match value {
            Value::Null => return,
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        if escaped {
            self.write_encoded(&text);
        } else {
            self.write_safe(&text);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_html_sensitive_characters() {
        let mut writer = EncodedWriter::new(true);
        writer.write_encoded("<a href=\"x\">&</a>");
        assert_eq!(
            writer.as_str(),
            "&lt;a href&#x3D;&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }

    #[test]
    fn null_writes_nothing_and_numbers_render_plainly() {
        let mut writer = EncodedWriter::new(false);
        writer.write_value(&Value::Null, true);
        writer.write_value(&json!(42), true);
        writer.write_value(&json!("<b>"), true);
        assert_eq!(writer.into_string(), "42<b>");
    }
}
