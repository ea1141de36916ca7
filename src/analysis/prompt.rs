//! Analysis prompt
//!
//! Asks for a process analysis in a given language and fixes the heading and
//! JSON shape of the flowchart block the report renderer looks for.

use crate::activity::{format_log, ActivityEvent};

/// Heading under which the model must emit the step list
pub const FLOWCHART_HEADING: &str = "FLOWCHART_JSON";

pub const LOGS_START: &str = "--- LOGS START ---";
pub const LOGS_END: &str = "--- LOGS END ---";

/// Instruction text sent next to the uploaded video
pub fn build_prompt(activity_log: &[ActivityEvent], language: &str) -> String {
    let logs = format_log(activity_log);

    format!(
        r#"You are an expert Process Analyst and Automation Engineer.
I have recorded a user's screen performing a business process.
Attached is the video recording.
Below are the logs of their actions and active windows during the recording:

{LOGS_START}
{logs}
{LOGS_END}

Please analyze this process and provide:
1. A detailed step-by-step description of the workflow observed.
2. Identification of bottlenecks, inefficiencies, or repetitive tasks.
3. The process as a structured list of steps. Put it under a heading that reads exactly `### {FLOWCHART_HEADING}`, immediately followed by a JSON array inside a ```json code block. Each element must be an object with the fields:
   - "id": a short unique string
   - "label": a short description of the step
   - "type": either "process" or "decision"
   - "next": the id of the following step, or null for the last step
4. Concrete suggestions for automation (e.g., using Python scripts, RPA tools, or API integrations).

IMPORTANT: Please write the entire response in {language}. Keep the `{FLOWCHART_HEADING}` heading and the JSON field names in English.
Format your response in Markdown.
"#
    )
}
