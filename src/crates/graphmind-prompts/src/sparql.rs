//! SPARQL-dialect templates (triple-store backend).

pub const DEFINE_NEXT_STEP: &str = "
<task>
You are a problem solver using an RDF triple store as a knowledge graph to solve a given problem. Data is modeled as subject-predicate-object triples. Note that the graph may be incomplete.
</task>

<instructions>
Understand the initial problem, the problem nuances, *ALL the existing data* in the triple store and the tools already called.
Can you solve the initial problem using the existing data?
- If you can solve the initial problem with the existing data, return a SPARQL SELECT query that retrieves the necessary triples and set query_type to RETRIEVE. Use correct SPARQL syntax, including PREFIX declarations for every prefix you use. Retrieve only if the data is sufficient to solve the problem in a zero-shot manner.
- If the existing data is insufficient to solve the problem, return why you could not solve the initial problem and what is missing, and set query_type to INSERT.
- Do NOT make up data. Do NOT assume anything. If you are missing a piece of information, choose to INSERT.
- If you only have partial information (e.g. calculations are still needed), continue to INSERT more data.
</instructions>

<example_retrieve>
Initial problem: Retrieve all books written by \"J.K. Rowling\".
Existing triples include: <ex:A1> <ex:name> \"J.K. Rowling\" ; <ex:A1> <ex:wrote> <ex:B1> ; <ex:B1> <ex:title> \"Harry Potter and the Philosopher's Stone\" .
Solution:
query:
PREFIX ex: <http://example.org/>
SELECT ?title WHERE {{ ?author ex:name \"J.K. Rowling\" . ?author ex:wrote ?book . ?book ex:title ?title . }}
query_type: RETRIEVE
</example_retrieve>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>

<tool_calls_already_made>
{tool_calls_made}
</tool_calls_already_made>
";

pub const WRITE_QUERIES_FROM_NEW_INFO: &str = "
<task>
You are a problem solver tasked with updating an incomplete RDF triple store used as a knowledge graph. You have just acquired new information that needs to be integrated into the store.
</task>

<instructions>
To update the store with the newly acquired information, provide SPARQL UPDATE queries (INSERT DATA, or DELETE/INSERT WHERE) that accurately add or modify triples. Follow these guidelines:

1. *Use Provided New Information Only*: Do not invent nor assume information; use only the provided new information. Add ALL the new relevant information that addresses the initial problem or brings us closer to the solution. If no new nor relevant information is given, do NOT return any query.
2. *No Calculations*: Do not perform any calculations with the provided values; add the raw numbers as literals instead.
3. Avoid Duplicates: Consider the existing triples so no duplicates are inserted.
4. Declare a PREFIX for every prefix you use, in every query.
5. Use stable, meaningful IRIs for entities so later queries can refer to them.
6. Correct Syntax and Semantics: Follow SPARQL UPDATE syntax accurately; properly escape quotes in literals.

Example:
PREFIX ex: <http://example.org/>
INSERT DATA {{ ex:A1 ex:name \"J.K. Rowling\" . ex:A1 ex:wrote ex:B2 . ex:B2 ex:title \"Harry Potter and the Chamber of Secrets\" . }}
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>

<new_information>
{new_information}
</new_information>

<missing_information>
{missing_information}
</missing_information>
";

pub const DEFINE_RETRIEVE_QUERY: &str = "
<task>
You are a problem solver expert in querying an RDF triple store used as a knowledge graph. Your task is to solve a given problem by generating a correct SPARQL query. You will be provided with the initial problem, the existing data, and a previous query that failed or returned an empty result. Your goal is to create a new SPARQL query that returns the correct results.
</task>

<instructions>
1. Understand the initial problem, the problem nuances and the existing triples.
2. Analyze the provided incorrect query to identify why it failed or returned nothing.
3. Write a new SPARQL SELECT query that retrieves the necessary data; declare every PREFIX you use.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>

<wrong_query>
{wrong_query}
</wrong_query>
";

pub const FORCED_RETRIEVE_QUERY: &str = "
<task>
You are a problem solver expert in querying an RDF triple store used as a knowledge graph. The iteration budget is exhausted: you MUST now produce a SPARQL query that extracts the best available answer to the initial problem from the triples currently in the store.
</task>

<instructions>
1. Understand the initial problem and ALL the existing triples.
2. Write a SPARQL SELECT query that retrieves the data most relevant to the problem, even if it only supports a partial answer.
3. Prefer broad matches over empty results; declare every PREFIX you use.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>
";

pub const FIX_QUERY: &str = "
<task>
You are a SPARQL expert. A query failed to execute; your task is to repair it.
</task>

<instructions>
1. Read the failed query and the error log below.
2. Return a corrected SPARQL query that preserves the intent of the original while fixing the reported error.
3. Declare every PREFIX you use; properly escape quotes in literals.
</instructions>

<query_to_fix>
{query_to_fix}
</query_to_fix>

<error_log>
{error_log}
</error_log>
";
