//! Templates that never mention query syntax; shared by all dialects.

pub const MERGE_REASONS_TO_INSERT: &str = "
<task>
You are a logic expert, your task is to determine why a given problem cannot be solved using the existing data in a knowledge graph.
</task>

<instructions>
You are provided with a list of reasons. Your job is to combine these reasons into a single, coherent paragraph, ensuring that there are no duplicates.
- Carefully review and understand each reason provided.
- Synthesize the reasons into one unified text.
</instructions>

<list_of_reasons>
{list_of_reasons}
</list_of_reasons>
";

pub const DEFINE_TOOL_CALLS: &str = "
<task>
You are a problem solver building up a knowledge graph that should eventually contain everything needed to solve the initial problem. The graph is still missing information; your task is to call the tools that will retrieve it.
</task>

<instructions>
1. Understand the initial problem, the current content of the knowledge graph and the reason the existing data is insufficient.
2. Choose the tool or tools whose output will provide the missing information. You may request several tool calls when several independent pieces of information are missing.
3. Provide complete, specific arguments for every call. Tools cannot see the problem unless you pass it to them.
4. Do NOT repeat a call that has already been made; the calls already made are listed below. A repeated call returns the same output and wastes an iteration.
5. If no specialised tool fits, fall back to the llm_query tool.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>

<missing_information>
{missing_information}
</missing_information>

<tool_calls_already_made>
{tool_calls_made}
</tool_calls_already_made>
";

pub const DEFINE_MATH_TOOL_CALL: &str = "
<task>
You are a problem solver with a partial solution that still requires computation. Your task is to produce the code-executor call that performs the remaining calculations.
</task>

<instructions>
1. Understand the initial problem and the partial solution below.
2. Write code that carries out the remaining arithmetic, statistics or probability work using ONLY the numbers present in the partial solution and the problem.
3. ALWAYS print the final computed value.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<current_solution>
{current_solution}
</current_solution>
";

pub const DEFINE_NEED_FOR_MATH: &str = "
<task>
You are a problem solver reviewing a partial solution. Decide whether the partial solution still requires mathematical or probability calculations before it can be presented as a final answer.
</task>

<instructions>
- Answer true when the partial solution contains raw numbers that still need to be combined, aggregated, rounded or otherwise computed to answer the initial problem.
- Answer false when the partial solution already contains the final value or no computation is involved.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<partial_solution>
{partial_solution}
</partial_solution>
";

pub const PARSE_SOLUTION: &str = "
<task>
You are given a problem and a partial solution. Produce the final solution formatted the way the problem asks for it.
</task>

<instructions>
1. Read the initial problem carefully and identify the answer format it requires (a sentence, a number, a list, ...).
2. Extract the answer from the partial solution and restate it in that format.
3. Do not add commentary, reasoning or caveats; return only the formatted final solution.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<partial_solution>
{partial_solution}
</partial_solution>
";

pub const PARSE_SOLUTION_STRICT: &str = "
<task>
You are given a problem and a partial solution. Produce the final answer in strict benchmark format.
</task>

<instructions>
The final answer must be a number OR as few words as possible OR a comma separated list of numbers and/or strings.
- If you are asked for a number, don't use commas to write your number, nor use units such as $ or percent signs, and do not add any trailing punctuation.
- If you are asked for a string, don't use articles, nor abbreviations (e.g. for cities), and write the digits in plain text unless specified otherwise.
- If you are asked for a comma separated list, apply the above rules depending on whether each element is a number or a string.
- Return ONLY the final answer, nothing else.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<partial_solution>
{partial_solution}
</partial_solution>
";

pub const FINAL_SOLUTION_VOTE: &str = "
<task>
You are given a problem, the raw material the candidate answers were derived from, and several formatted candidate answers. Pick the best final solution.
</task>

<instructions>
1. Understand the initial problem and the answer format it requires.
2. Compare the candidate solutions against the raw material; discard candidates that are empty, malformed or unsupported.
3. Return the single best candidate, adjusted to the required format if needed.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<raw_material>
{partial_solution}
</raw_material>

<candidate_solutions>
{list_final_solutions}
</candidate_solutions>
";

pub const FORCED_SOLUTION: &str = "
<task>
You are a problem solver that must now commit to an answer. The knowledge graph below is everything that was gathered; retrieval attempts returned nothing usable.
</task>

<instructions>
1. Understand the initial problem and whatever partial information the graph contains.
2. Produce your best guess for the solution. An educated guess grounded in the graph content is preferred, but you MUST return a non-empty answer even if the graph is empty.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>
";
