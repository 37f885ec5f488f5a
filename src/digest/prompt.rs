//! LLM prompt templates for blog digests.

use crate::types::RangeQuery;

/// Mission header placed before the URL list.
pub fn prefix(query: &RangeQuery) -> String {
    let context_phrase = match &query.match_string {
        Some(pattern) => format!(
            "containing stories including some with text matching regex \
             《{pattern}》. I am only interested in those stories. Ignore \
             other stories in these pages"
        ),
        None => "focused on AI and software development".to_string(),
    };

    format!(
        "# MISSION: SUMMARIZE ARTICLES FROM THE WEB\n\
         \n\
         Here are links to some recent blog posts from {start} through \
         {end}, {context_phrase}. Each of these posts typically discusses \
         multiple current stories in great detail.\n\
         \n\
         ## URLs of articles to read from the Web",
        start = query.start_date,
        end = query.end_date,
    )
}

/// Task description placed after the URL list.
pub fn suffix(query: &RangeQuery) -> String {
    let (find_phrase, select_phrase) = match &query.match_string {
        Some(pattern) => (
            format!(
                "Find the stories about 《{pattern}》. Ignore any other \
                 stories in these articles, and anything not mentioned \
                 directly and explicitly in at least one of them."
            ),
            format!(
                "Select only the relevant stories. Remember that our topic \
                 is 《{pattern}》."
            ),
        ),
        None => (
            "Find the most important stories in each of these posts.\n\n\
             Create a **comprehensive report** aimed at **software \
             practitioners**. Focus on the ten to twenty most compelling \
             stories."
                .to_string(),
            "Select the most compelling stories and combine them into a \
             consistent and accurate narrative."
                .to_string(),
        ),
    };

    format!(
        "## Your Task:\n\
         \n\
         Read the blog post webpages referenced by each of these URLs. \
         You must read the actual pages; do not extrapolate or guess from \
         the page titles.\n\
         \n\
         {find_phrase}\n\
         \n\
         ## Workflow & Requirements:\n\
         \n\
         1. **Read blog posts** using your web-browsing capabilities.\n\
         \n\
         2. **Extract & Organize Stories**\n\
         \n\
            - Identify and extract multiple **distinct stories, insights, \
         or notable points** from each post.\n\
            - Prove that you have read the page contents by including some \
         interesting direct quotes.\n\
         \n\
         3. **Write the Report**\n\
         \n\
            - {select_phrase}\n\
            - For each selected story, write a one-paragraph **summary** of \
         its key points, **immediately** followed by the **title of the \
         source blog post** and its **URL** in parentheses.\n\
            - Summarize only stories from the blog posts shared above; no \
         other URLs are acceptable.\n\
            - Ensure the report is **structured and well-organized** for \
         easy readability."
    )
}
