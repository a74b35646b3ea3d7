use crate::platform::types;

/// Map octocrab Issue to our platform Issue type.
pub fn map_issue(issue: &octocrab::models::issues::Issue) -> types::Issue {
    types::Issue {
        number: issue.number,
        title: issue.title.clone(),
        body: issue.body.clone().unwrap_or_default(),
        labels: issue.labels.iter().map(|l| l.name.clone()).collect(),
    }
}

pub fn map_pull_request(pr: octocrab::models::pulls::PullRequest) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        head_sha: pr.head.sha,
        head_branch: pr.head.ref_field,
        base_branch: pr.base.ref_field,
        html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
    }
}

/// Reduce a `GET /commits/{sha}/status` response to a [`types::CommitStatus`].
pub fn map_commit_status(response: &serde_json::Value) -> types::CommitStatus {
    let state = response["state"].as_str().unwrap_or("unknown").to_string();
    let details = response["statuses"]
        .as_array()
        .map(|statuses| {
            statuses
                .iter()
                .map(|s| {
                    format!(
                        "{}: {} {}",
                        s["context"].as_str().unwrap_or("ci"),
                        s["state"].as_str().unwrap_or("unknown"),
                        s["description"].as_str().unwrap_or_default()
                    )
                    .trim_end()
                    .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    types::CommitStatus { state, details }
}
