//! 合成的 HTML 内容：错误页面与 POST 数据回显。

use crate::{
    exception::Exception,
    param::{HttpStatus, HTML_MARKER},
};

pub struct HtmlBuilder;

impl HtmlBuilder {
    /// 错误页面，原样嵌入客户端发来的请求文本
    pub fn error_page(status: HttpStatus, request: &str) -> String {
        format!(
            "<html><h1>{}</h1><body>Error {}</body></html>",
            status, request
        )
    }

    /// 把 POST 数据插入到文档第一个 `<html>` 行之后。
    pub fn splice_post_data(document: &str, post_data: &str) -> Result<String, Exception> {
        let index = document
            .find(HTML_MARKER)
            .ok_or(Exception::PostMarkerMissing)?;
        let (head, tail) = document.split_at(index + HTML_MARKER.len());
        Ok(format!(
            "{}<h1>Post Data</h1><pre>{}</pre>\n{}",
            head, post_data, tail
        ))
    }
}
