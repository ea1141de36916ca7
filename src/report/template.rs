//! Self-contained report document

use chrono::{DateTime, Local};

const STYLE: &str = r#"
        body {
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            line-height: 1.6;
            color: #333;
            background-color: #f4f4f9;
            margin: 0;
            padding: 20px;
        }
        .container {
            max-width: 900px;
            margin: 0 auto;
            background: #fff;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.1);
        }
        h1, h2, h3 {
            color: #2c3e50;
        }
        h1 {
            border-bottom: 2px solid #3498db;
            padding-bottom: 10px;
        }
        code {
            background-color: #f8f9fa;
            padding: 2px 4px;
            border-radius: 4px;
            font-family: 'Courier New', Courier, monospace;
        }
        pre {
            background-color: #f8f9fa;
            padding: 15px;
            border-radius: 5px;
            overflow-x: auto;
        }
        table {
            border-collapse: collapse;
            margin: 20px 0;
            width: 100%;
        }
        th, td {
            border: 1px solid #ddd;
            padding: 8px 12px;
            text-align: left;
        }
        th {
            background-color: #f8f9fa;
        }
        .flowchart-container {
            display: flex;
            flex-direction: column;
            align-items: center;
            margin: 30px 0;
            padding: 20px;
            background-color: #f8f9fa;
            border-radius: 8px;
        }
        .flow-step {
            background-color: #fff;
            border: 2px solid #3498db;
            border-radius: 8px;
            padding: 15px 25px;
            margin: 10px 0;
            text-align: center;
            font-weight: 500;
            box-shadow: 0 2px 5px rgba(0,0,0,0.05);
            max-width: 80%;
            position: relative;
        }
        .flow-step.decision {
            border-color: #e67e22;
            border-radius: 20px;
        }
        .flow-arrow {
            font-size: 24px;
            color: #7f8c8d;
            margin: -5px 0;
        }
        .error {
            color: #c0392b;
            background-color: #fdecea;
            border: 1px solid #e74c3c;
            border-radius: 5px;
            padding: 10px 15px;
            margin: 20px 0;
        }
        .footer {
            margin-top: 40px;
            text-align: center;
            font-size: 0.9em;
            color: #7f8c8d;
        }
"#;

/// Wrap rendered body HTML in the styled report page
pub fn report_document(body: &str, generated_at: DateTime<Local>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Relatório de Análise de Processo</title>
    <style>{style}    </style>
</head>
<body>
    <div class="container">
        <h1>Relatório de Análise de Processo</h1>
        <p><strong>Data da Análise:</strong> {date}</p>
        <hr>
{body}
        <div class="footer">
            <p>Gerado por Corporate Process Analyzer AI</p>
        </div>
    </div>
</body>
</html>
"#,
        style = STYLE,
        date = generated_at.format("%d/%m/%Y %H:%M"),
        body = body,
    )
}
