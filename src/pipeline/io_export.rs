// Writers for the flat record table, the facts dumps and the metrics file,
// plus the readers that rebuild facts from a dump.

use crate::pipeline::*;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

pub fn write_likert_csv(path: &str, records: &[LikertRecord]) -> RunResult<()> {
    let mut writer = csv::Writer::from_path(path).context(CsvOpenSnafu { path })?;
    writer
        .write_record(["annotator", "document", "system", "corpus", "score"])
        .context(CsvWriteSnafu { path })?;
    for record in records {
        writer
            .write_record([
                record.annotator.to_string(),
                record.document.to_string(),
                record.system.clone(),
                record.corpus.clone(),
                record.score.to_string(),
            ])
            .context(CsvWriteSnafu { path })?;
    }
    writer.flush().context(WritingOutputSnafu { path })?;
    Ok(())
}

pub fn write_bws_csv(path: &str, records: &[BwsRecord]) -> RunResult<()> {
    let mut writer = csv::Writer::from_path(path).context(CsvOpenSnafu { path })?;
    writer
        .write_record(["annotator", "document", "system", "corpus", "rank"])
        .context(CsvWriteSnafu { path })?;
    for record in records {
        writer
            .write_record([
                record.annotator.to_string(),
                record.document.to_string(),
                record.system.clone(),
                record.corpus.clone(),
                record.rank.to_string(),
            ])
            .context(CsvWriteSnafu { path })?;
    }
    writer.flush().context(WritingOutputSnafu { path })?;
    Ok(())
}

// The facts dump is a nested JSON tree: document -> system or role ->
// [worker, value] pairs in annotator arrival order.

fn worker_json(worker: &Option<String>) -> JSValue {
    match worker {
        Some(w) => json!(w),
        None => JSValue::Null,
    }
}

pub fn write_likert_facts(path: &str, facts: &LikertFacts) -> RunResult<()> {
    let mut root = JSMap::new();
    for (document, by_system) in facts.scores.iter() {
        let mut document_js = JSMap::new();
        for (system, ratings) in by_system.iter() {
            let pairs: Vec<JSValue> = ratings
                .iter()
                .map(|r| json!([worker_json(&r.worker), r.score]))
                .collect();
            document_js.insert(system.clone(), JSValue::Array(pairs));
        }
        root.insert(document.to_string(), JSValue::Object(document_js));
    }
    write_json(path, &JSValue::Object(root))
}

pub fn write_bws_facts(path: &str, facts: &BwsFacts) -> RunResult<()> {
    let mut root = JSMap::new();
    for (document, picks) in facts.picks.iter() {
        let mut document_js = JSMap::new();
        for role in [Role::Best, Role::Worst] {
            let pairs: Vec<JSValue> = picks
                .picks(role)
                .iter()
                .map(|p| json!([worker_json(&p.worker), p.system]))
                .collect();
            document_js.insert(role.label().to_string(), JSValue::Array(pairs));
        }
        root.insert(document.to_string(), JSValue::Object(document_js));
    }
    write_json(path, &JSValue::Object(root))
}

pub fn read_likert_facts(path: &str) -> RunResult<LikertFacts> {
    let root = read_json_object(path)?;
    let mut facts = LikertFacts::new();
    for (document_key, by_system) in root.iter() {
        let document = parse_document(path, document_key)?;
        let by_system = by_system.as_object().context(JsonShapeSnafu {
            path,
            detail: format!("document {} is not an object", document_key),
        })?;
        for (system, pairs) in by_system.iter() {
            let pairs = pairs.as_array().context(JsonShapeSnafu {
                path,
                detail: format!("document {} system {} is not a list", document_key, system),
            })?;
            for pair in pairs.iter() {
                let (worker, value) = split_pair(path, pair)?;
                let score = value.as_i64().context(JsonShapeSnafu {
                    path,
                    detail: format!("score {:?} is not an integer", value),
                })?;
                facts.push(document, system, worker, score);
            }
        }
    }
    Ok(facts)
}

pub fn read_bws_facts(path: &str) -> RunResult<BwsFacts> {
    let root = read_json_object(path)?;
    let mut facts = BwsFacts::new();
    for (document_key, by_role) in root.iter() {
        let document = parse_document(path, document_key)?;
        let by_role = by_role.as_object().context(JsonShapeSnafu {
            path,
            detail: format!("document {} is not an object", document_key),
        })?;
        for (role_key, pairs) in by_role.iter() {
            let role = match role_key.as_str() {
                "best" => Role::Best,
                "worst" => Role::Worst,
                x => whatever!("{}: unknown role {:?}", path, x),
            };
            let pairs = pairs.as_array().context(JsonShapeSnafu {
                path,
                detail: format!("document {} role {} is not a list", document_key, role_key),
            })?;
            for pair in pairs.iter() {
                let (worker, value) = split_pair(path, pair)?;
                let system = value.as_str().context(JsonShapeSnafu {
                    path,
                    detail: format!("system {:?} is not a string", value),
                })?;
                facts.push(document, role, worker, system);
            }
        }
    }
    Ok(facts)
}

pub fn write_metrics(path: &str, report: &ConsistencyReport) -> RunResult<()> {
    let mut workers = JSMap::new();
    for (worker, metric) in report.per_worker.iter() {
        workers.insert(worker.clone(), json!(metric));
    }
    let js = json!({ "perWorker": workers, "overallMean": report.mean });
    write_json(path, &js)
}

fn write_json(path: &str, js: &JSValue) -> RunResult<()> {
    let pretty = serde_json::to_string_pretty(js).context(ParsingJsonSnafu { path })?;
    fs::write(path, pretty).context(WritingOutputSnafu { path })?;
    Ok(())
}

fn read_json_object(path: &str) -> RunResult<JSMap<String, JSValue>> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    match js {
        JSValue::Object(m) => Ok(m),
        _ => whatever!("{}: expected a JSON object at the top level", path),
    }
}

fn parse_document(path: &str, key: &str) -> RunResult<u32> {
    key.parse::<u32>().ok().context(JsonShapeSnafu {
        path,
        detail: format!("document key {:?} is not an integer", key),
    })
}

fn split_pair<'a>(path: &str, pair: &'a JSValue) -> RunResult<(Option<String>, &'a JSValue)> {
    match pair.as_array().map(|a| a.as_slice()) {
        Some([worker, value]) => {
            let worker = match worker {
                JSValue::Null => None,
                JSValue::String(w) => Some(w.clone()),
                _ => whatever!(
                    "{}: worker entry {:?} is neither null nor a string",
                    path,
                    worker
                ),
            };
            Ok((worker, value))
        }
        _ => whatever!("{}: expected a [worker, value] pair, got {:?}", path, pair),
    }
}
