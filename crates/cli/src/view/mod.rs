use common::api::{AgentDescriptor, User};
use serde::Serialize;

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_user(user: &User) -> String {
    let mut lines = vec![
        format!("user_id:  {}", user.user_id),
        format!("username: {}", user.username),
        format!("role:     {}", user.role),
    ];
    if !user.permissions.is_empty() {
        lines.push(format!("permissions: {}", user.permissions.join(", ")));
    }
    lines.join("\n")
}

pub fn render_agents_table(agents: &[AgentDescriptor], selected: Option<&str>) -> String {
    if agents.is_empty() {
        return "no agents found".to_string();
    }
    let rows = agents
        .iter()
        .map(|agent| {
            vec![
                if selected == Some(agent.agent_id.as_str()) {
                    "*".to_string()
                } else {
                    String::new()
                },
                agent.agent_id.clone(),
                agent.agent_name.clone(),
                display_or_dash(&agent.status),
                agent.health.clone().unwrap_or_else(|| "-".into()),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["", "AGENT_ID", "NAME", "STATUS", "HEALTH"], &rows)
}

fn display_or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let format_row = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(headers.to_vec()));
    for row in rows {
        lines.push(format_row(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}
