use std::io::Write;
use serde::Serialize;
use shared::types::{FieldSelection, OutputField, Service};
use crate::output::summary::RunSummary;

/// Renders one text line with the selected fields, space separated.
///
/// Fields always appear in the order count, service, hostname, address, port,
/// text whatever order they were requested in. Empty text is left out.
pub fn render_line(
    selection: &FieldSelection,
    seq: usize,
    service_type: &str,
    hostname: &str,
    address: &str,
    port: u16,
    text: &str,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(OutputField::ALL.len());
    for field in OutputField::ALL {
        if !selection.contains(field) {
            continue;
        }
        match field {
            OutputField::Count => parts.push(seq.to_string()),
            OutputField::Service => parts.push(service_type.to_string()),
            OutputField::Hostname => parts.push(hostname.to_string()),
            OutputField::Address => parts.push(address.to_string()),
            OutputField::Port => parts.push(port.to_string()),
            OutputField::Text if !text.is_empty() => parts.push(text.to_string()),
            OutputField::Text => {}
        }
    }
    parts.join(" ")
}

/// Renders a discovered service as a text line
pub fn render_service(selection: &FieldSelection, seq: usize, service: &Service) -> String {
    render_line(
        selection,
        seq,
        &service.service_type,
        &service.hostname,
        &service.address,
        service.port,
        &service.text,
    )
}

#[derive(Serialize)]
struct Envelope<'a> {
    results: &'a [Service],
    summary: &'a RunSummary,
}

/// Writes the results as one pretty-printed JSON document: a bare array, or
/// a `{results, summary}` object when a summary is supplied.
pub fn write_json<W: Write>(
    mut out: W,
    services: &[Service],
    summary: Option<&RunSummary>,
) -> serde_json::Result<()> {
    match summary {
        Some(summary) => serde_json::to_writer_pretty(
            &mut out,
            &Envelope {
                results: services,
                summary,
            },
        )?,
        None => serde_json::to_writer_pretty(&mut out, services)?,
    }
    writeln!(out).map_err(serde_json::Error::io)
}
