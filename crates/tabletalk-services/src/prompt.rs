//! Seed messages — system prompt built from the dataset schema, plus the
//! UI-only greeting.

/// Instructions sent to the model as the first message of every request.
/// Never shown to the user.
pub fn system_prompt(table: &str, schema: &[(String, String)]) -> String {
    let mut columns = String::new();
    for (name, kind) in schema {
        columns.push_str(&format!("  {name} ({kind})\n"));
    }
    format!(
        "You are a data analyst answering questions about a single SQLite table \
         named \"{table}\". Columns:\n{columns}\
         When a question calls for data, call the run_query tool with a read-only \
         SELECT statement and a short title for the result, then summarize the \
         answer in plain language. Never invent columns or values."
    )
}

/// Shown to the user at session start; never sent to the model.
pub fn greeting(table: &str) -> String {
    format!("Hi! Ask me anything about the {table} dataset and I'll query it for you.")
}
