use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild, TableCellContent, TableChild, TableRowChild};

use common::error::AppError;

/// Extracts plain text from a `.docx` document's paragraphs and tables, in document order (§4.D
/// stage 1 lists DOCX alongside PDF/TXT/HTML/Markdown/CSV as a supported content type).
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, AppError> {
    let docx = read_docx(bytes).map_err(|err| AppError::InputInvalid(format!("invalid docx: {err}")))?;

    let mut paragraphs = Vec::new();
    for child in &docx.document.children {
        collect_document_child(child, &mut paragraphs);
    }

    Ok(paragraphs.join("\n"))
}

fn collect_document_child(child: &DocumentChild, out: &mut Vec<String>) {
    match child {
        DocumentChild::Paragraph(paragraph) => {
            let text = paragraph_text(&paragraph.children);
            if !text.is_empty() {
                out.push(text);
            }
        }
        DocumentChild::Table(table) => {
            for row in &table.rows {
                let TableChild::TableRow(row) = row;
                for cell in &row.cells {
                    let TableRowChild::TableCell(cell) = cell;
                    for content in &cell.children {
                        match content {
                            TableCellContent::Paragraph(paragraph) => {
                                let text = paragraph_text(&paragraph.children);
                                if !text.is_empty() {
                                    out.push(text);
                                }
                            }
                            TableCellContent::Table(_) => {}
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn paragraph_text(children: &[ParagraphChild]) -> String {
    let mut text = String::new();
    for child in children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(run_text) = run_child {
                    text.push_str(&run_text.text);
                }
            }
        }
    }
    text
}
